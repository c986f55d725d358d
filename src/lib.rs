pub mod config;
pub mod utils;
pub mod logging;
pub mod models;
pub mod aggregation;
pub mod submission;
pub mod places;
pub mod store;
pub mod session;
pub mod api;
pub mod cli;
pub mod tui;

pub use api::{ApiClient, ApiError};
pub use config::Config;
pub use models::{Activity, Category, Summary, User};
pub use session::Session;
pub use store::Store;
pub use utils::Profile;
