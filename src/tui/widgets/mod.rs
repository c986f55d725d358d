pub mod activity_list;
pub mod cards;
pub mod chat;
pub mod color;
pub mod confirm_delete;
pub mod dashboard;
pub mod discover;
pub mod form;
pub mod help;
pub mod input;
pub mod profile;
pub mod status_bar;
pub mod tabs;
