use std::io::{self, BufRead, IsTerminal, Write};

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use thiserror::Error;

use crate::aggregation::{self, EmissionsReport};
use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::models::{Activity, Category, ChatRequest, ProfileUpdate};
use crate::places::{self, PlaceCategory, Places};
use crate::session::{self, CredentialsError, Session};
use crate::store::{Store, StoreError};
use crate::submission::{ActivityDraft, ValidationError, DEFAULT_UNIT, ENERGY_TYPES};
use crate::utils::{format_kg, format_number, truncate};

#[derive(Parser)]
#[command(name = "ecotrack")]
#[command(about = "EcoTrack - track your carbon footprint from the terminal")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch interactive TUI (default if no subcommand)
    Tui,
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change name, email or weekly goal
    UpdateProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Weekly CO₂ budget in kg
        #[arg(long)]
        weekly_goal: Option<f64>,
    },
    /// Change the account password (prompts for all three fields)
    ChangePassword,
    /// Permanently delete the account
    DeleteAccount {
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Log a new activity
    #[command(subcommand)]
    Log(LogCommand),
    /// List activities
    List {
        /// transport, energy or all
        #[arg(long)]
        category: Option<String>,
    },
    /// Show total, count and average emissions
    Summary,
    /// Show the activity history
    History {
        /// transport, energy or all
        #[arg(long)]
        filter: Option<String>,
    },
    /// Delete an activity by id
    Delete {
        id: String,
    },
    /// List the energy sources the backend accepts
    EnergyTypes,
    /// Daily emissions for the last week with goal progress
    Report,
    /// Ask the assistant a question
    Chat {
        message: String,
        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,
    },
    /// List past assistant conversations
    Conversations,
    /// Personalised reduction tips
    Recommendations,
    /// Look up coordinates for an address
    Geocode {
        address: String,
    },
    /// Look up the address for coordinates
    ReverseGeocode {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    /// Browse eco-friendly places
    Places {
        /// food, transport, shopping or all
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Save or unsave a place
    Like {
        id: u32,
    },
}

#[derive(Subcommand)]
pub enum LogCommand {
    /// A trip
    Transport {
        /// Car, Bus, Train, Plane, Bike, Walk or Motorcycle
        #[arg(long)]
        vehicle: String,
        /// Distance in km
        #[arg(long)]
        distance: String,
        /// YYYY-MM-DD, defaults to now
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Household energy use
    Energy {
        /// Electricity, Natural Gas, Heating Oil, Coal or Appliance
        #[arg(long)]
        source: String,
        #[arg(long)]
        usage: String,
        /// kWh, m³, kg or liters
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    ApiError(#[from] ApiError),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("{0}")]
    ValidationError(#[from] ValidationError),
    #[error("{0}")]
    CredentialsError(#[from] CredentialsError),
    #[error("{0}")]
    InputError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Everything a subcommand needs
pub struct CliContext {
    pub config: Config,
    pub store: Store,
    pub session: Session,
    pub client: ApiClient,
}

impl Commands {
    /// A 401 from these means wrong credentials, not an expired token
    pub fn checks_credentials(&self) -> bool {
        matches!(
            self,
            Commands::Login { .. } | Commands::Register { .. } | Commands::ChangePassword | Commands::DeleteAccount { .. }
        )
    }
}

impl CliContext {
    fn require_login(&self) -> Result<(), CliError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::NotAuthenticated.into())
        }
    }
}

/// Run one subcommand. An expired token also clears the stored session.
pub async fn run(command: Commands, ctx: &mut CliContext) -> Result<(), CliError> {
    let checks_credentials = command.checks_credentials();
    let result = dispatch(command, ctx).await;
    if let Err(CliError::ApiError(e)) = &result
        && e.is_unauthorized()
        && !checks_credentials
    {
        tracing::warn!("Token rejected by the backend; clearing session");
        ctx.session.clear(&ctx.store)?;
    }
    result
}

async fn dispatch(command: Commands, ctx: &mut CliContext) -> Result<(), CliError> {
    match command {
        // Handled by main before the runtime starts
        Commands::Tui => Ok(()),
        Commands::Register { name, email, password } => handle_register(ctx, name, email, password).await,
        Commands::Login { email, password } => handle_login(ctx, email, password).await,
        Commands::Logout => handle_logout(ctx),
        Commands::Whoami => handle_whoami(ctx).await,
        Commands::UpdateProfile { name, email, weekly_goal } => {
            handle_update_profile(ctx, name, email, weekly_goal).await
        }
        Commands::ChangePassword => handle_change_password(ctx).await,
        Commands::DeleteAccount { password } => handle_delete_account(ctx, password).await,
        Commands::Log(log) => handle_log(ctx, log).await,
        Commands::List { category } => handle_list(ctx, category).await,
        Commands::Summary => handle_summary(ctx).await,
        Commands::History { filter } => handle_history(ctx, filter).await,
        Commands::Delete { id } => handle_delete(ctx, id).await,
        Commands::EnergyTypes => handle_energy_types(ctx).await,
        Commands::Report => handle_report(ctx).await,
        Commands::Chat { message, conversation } => handle_chat(ctx, message, conversation).await,
        Commands::Conversations => handle_conversations(ctx).await,
        Commands::Recommendations => handle_recommendations(ctx).await,
        Commands::Geocode { address } => handle_geocode(ctx, address).await,
        Commands::ReverseGeocode { lat, lng } => handle_reverse_geocode(ctx, lat, lng).await,
        Commands::Places { category, search } => handle_places(ctx, category, search),
        Commands::Like { id } => handle_like(ctx, id),
    }
}

/// Read a password without echoing it when stdin is a terminal
fn prompt_password(label: &str) -> Result<String, CliError> {
    eprint!("{}: ", label);
    io::stderr().flush()?;

    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    terminal::enable_raw_mode()?;
    let result = read_masked();
    terminal::disable_raw_mode()?;
    eprintln!();
    result
}

fn read_masked() -> Result<String, CliError> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Enter => return Ok(password),
                KeyCode::Backspace => {
                    password.pop();
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(CliError::InputError("Cancelled".to_string()));
                }
                KeyCode::Esc => return Err(CliError::InputError("Cancelled".to_string())),
                KeyCode::Char(c) => password.push(c),
                _ => {}
            }
        }
    }
}

fn password_or_prompt(password: Option<String>, label: &str) -> Result<String, CliError> {
    match password {
        Some(p) => Ok(p),
        None => prompt_password(label),
    }
}

fn parse_category_filter(value: Option<String>) -> Result<Option<Category>, CliError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    Category::parse_filter(trimmed)
        .map(Some)
        .ok_or_else(|| CliError::InputError(format!("Unknown category '{}'", trimmed)))
}

fn print_activities(activities: &[Activity]) {
    if activities.is_empty() {
        println!("No activities logged yet.");
        return;
    }
    println!("{:<26} {:<10} {:<14} {:>12} {:>10}  {}", "ID", "CATEGORY", "TYPE", "AMOUNT", "CO₂", "DATE");
    for activity in activities {
        println!(
            "{:<26} {:<10} {:<14} {:>12} {:>10}  {}",
            truncate(&activity.id, 26),
            activity.category.label(),
            truncate(&activity.kind, 14),
            activity.quantity_label(),
            format_kg(activity.emission()),
            activity.timestamp,
        );
    }
}

async fn handle_register(
    ctx: &mut CliContext,
    name: String,
    email: String,
    password: Option<String>,
) -> Result<(), CliError> {
    let (password, confirmation) = match password {
        Some(p) => (p.clone(), p),
        None => (prompt_password("Password")?, prompt_password("Confirm password")?),
    };
    let request = session::register_request(&name, &email, &password, &confirmation)?;
    let auth = ctx.client.register(&request).await?;
    ctx.session.begin(&ctx.store, auth)?;
    println!("Account created. Signed in as {}", request.email);
    Ok(())
}

async fn handle_login(ctx: &mut CliContext, email: String, password: Option<String>) -> Result<(), CliError> {
    let password = password_or_prompt(password, "Password")?;
    let request = session::login_request(&email, &password)?;
    let auth = ctx.client.login(&request).await?;
    let name = auth.user.display_name().to_string();
    ctx.session.begin(&ctx.store, auth)?;
    println!("Signed in as {}", name);
    Ok(())
}

fn handle_logout(ctx: &mut CliContext) -> Result<(), CliError> {
    ctx.session.clear(&ctx.store)?;
    println!("Signed out");
    Ok(())
}

async fn handle_whoami(ctx: &mut CliContext) -> Result<(), CliError> {
    ctx.require_login()?;
    let user = ctx.client.profile().await?;
    ctx.session.update_user(&ctx.store, user.clone())?;
    println!("Name:        {}", user.name);
    println!("Email:       {}", user.email);
    println!(
        "Weekly goal: {}",
        format_kg(aggregation::weekly_goal(user.weekly_goal_kg, ctx.config.weekly_goal_kg))
    );
    Ok(())
}

async fn handle_update_profile(
    ctx: &mut CliContext,
    name: Option<String>,
    email: Option<String>,
    weekly_goal: Option<f64>,
) -> Result<(), CliError> {
    ctx.require_login()?;
    if weekly_goal.is_some_and(|g| !g.is_finite() || g <= 0.0) {
        return Err(CliError::InputError("Weekly goal must be a positive number".to_string()));
    }
    let update = ProfileUpdate {
        name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        email: email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
        weekly_goal,
    };
    if update.is_empty() {
        return Err(CliError::InputError("Nothing to update".to_string()));
    }
    let user = ctx.client.update_profile(&update).await?;
    ctx.session.update_user(&ctx.store, user)?;
    println!("Profile updated");
    Ok(())
}

async fn handle_change_password(ctx: &mut CliContext) -> Result<(), CliError> {
    ctx.require_login()?;
    let current = prompt_password("Current password")?;
    let new = prompt_password("New password")?;
    let confirmation = prompt_password("Confirm new password")?;
    let change = session::password_change(&current, &new, &confirmation)?;
    let message = ctx.client.change_password(&change).await?;
    println!("{}", message);
    Ok(())
}

async fn handle_delete_account(ctx: &mut CliContext, password: Option<String>) -> Result<(), CliError> {
    ctx.require_login()?;
    let password = password_or_prompt(password, "Password")?;
    if password.is_empty() {
        return Err(CredentialsError::MissingField("Password").into());
    }
    ctx.client.delete_account(&password).await?;
    ctx.session.clear(&ctx.store)?;
    println!("Account deleted");
    Ok(())
}

async fn handle_log(ctx: &mut CliContext, log: LogCommand) -> Result<(), CliError> {
    ctx.require_login()?;
    let draft = match log {
        LogCommand::Transport { vehicle, distance, date, notes } => ActivityDraft {
            kind: vehicle,
            amount: distance,
            date: date.unwrap_or_default(),
            notes: notes.unwrap_or_default(),
            ..ActivityDraft::new(Category::Transport)
        },
        LogCommand::Energy { source, usage, unit, date, notes } => ActivityDraft {
            kind: source,
            amount: usage,
            unit: unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            date: date.unwrap_or_default(),
            notes: notes.unwrap_or_default(),
            ..ActivityDraft::new(Category::Energy)
        },
    };

    // Rejected drafts never reach the backend
    let activity = draft.validate()?;
    let created = ctx.client.create_activity(&activity).await?;
    println!(
        "Logged {} {} ({}): {}",
        created.category.label().to_lowercase(),
        created.kind,
        created.quantity_label(),
        format_kg(created.emission())
    );
    Ok(())
}

async fn handle_list(ctx: &mut CliContext, category: Option<String>) -> Result<(), CliError> {
    ctx.require_login()?;
    let category = parse_category_filter(category)?;
    let activities = ctx.client.list_activities(category).await?;
    print_activities(&activities);
    Ok(())
}

async fn handle_summary(ctx: &mut CliContext) -> Result<(), CliError> {
    ctx.require_login()?;
    let summary = ctx.client.summary().await?;
    println!("Total emissions:   {}", format_kg(summary.total_emissions_kg));
    println!("Activities logged: {}", summary.activities_logged);
    println!("Average:           {}", format_kg(summary.average_kg));
    Ok(())
}

async fn handle_history(ctx: &mut CliContext, filter: Option<String>) -> Result<(), CliError> {
    ctx.require_login()?;
    let category = parse_category_filter(filter)?;
    let activities = ctx.client.history(category).await?;
    print_activities(&activities);
    Ok(())
}

async fn handle_delete(ctx: &mut CliContext, id: String) -> Result<(), CliError> {
    ctx.require_login()?;
    ctx.client.delete_activity(&id).await?;
    println!("Activity {} deleted", id);
    Ok(())
}

async fn handle_energy_types(ctx: &mut CliContext) -> Result<(), CliError> {
    let types = match ctx.client.energy_types().await {
        Ok(types) if !types.is_empty() => types,
        Ok(_) => ENERGY_TYPES.iter().map(|t| t.to_string()).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Energy types unavailable; using built-in list");
            ENERGY_TYPES.iter().map(|t| t.to_string()).collect()
        }
    };
    for t in types {
        println!("{}", t);
    }
    Ok(())
}

fn print_report(report: &EmissionsReport) {
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10}",
        "DAY", "TRANSPORT", "ENERGY", "FOOD", "TOTAL"
    );
    for bucket in &report.series {
        println!(
            "{:<8} {:>10} {:>10} {:>10} {:>10}",
            bucket.label,
            format_number(bucket.by_category.transport),
            format_number(bucket.by_category.energy),
            format_number(bucket.by_category.food),
            format_number(bucket.total),
        );
    }
    if report.earlier.sum() > 0.0 {
        println!(
            "{:<8} {:>10} {:>10} {:>10}",
            "earlier",
            format_number(report.earlier.transport),
            format_number(report.earlier.energy),
            format_number(report.earlier.food),
        );
    }
    println!(
        "{:<8} {:>10} {:>10} {:>10}",
        "all",
        format_number(report.totals.transport),
        format_number(report.totals.energy),
        format_number(report.totals.food),
    );
    if report.skipped > 0 {
        println!("({} activities without a readable date are only in the totals)", report.skipped);
    }
}

async fn handle_report(ctx: &mut CliContext) -> Result<(), CliError> {
    ctx.require_login()?;
    let history = ctx.client.history(None).await?;
    let report = aggregation::aggregate(&history);
    if report.is_empty() {
        println!("No activities logged yet. Log one with `ecotrack log`.");
        return Ok(());
    }
    print_report(&report);

    let average = report.daily_average();
    let diff = aggregation::compare_to_national(average);
    println!();
    println!(
        "Daily average: {} ({}% {} the national average)",
        format_kg(average),
        format_number(diff.abs()),
        if diff <= 0.0 { "below" } else { "above" }
    );

    let goal = aggregation::weekly_goal(ctx.session.user().and_then(|u| u.weekly_goal_kg), ctx.config.weekly_goal_kg);
    let week = aggregation::rolling_week_total(&history, Utc::now(), &Local);
    let progress = aggregation::goal_progress(week, goal);
    if progress.exceeded {
        println!(
            "Weekly goal: {} of {} used, goal exceeded",
            format_kg(progress.used_kg),
            format_kg(progress.goal_kg)
        );
    } else {
        println!(
            "Weekly goal: {} of {} used ({}%), {} left",
            format_kg(progress.used_kg),
            format_kg(progress.goal_kg),
            progress.percent,
            format_kg(progress.remaining_kg)
        );
    }
    Ok(())
}

async fn handle_chat(ctx: &mut CliContext, message: String, conversation: Option<String>) -> Result<(), CliError> {
    ctx.require_login()?;
    let message = message.trim().to_string();
    if message.is_empty() {
        return Err(CliError::InputError("Message is empty".to_string()));
    }
    let reply = ctx
        .client
        .chat(&ChatRequest {
            message,
            conversation_id: conversation,
        })
        .await?;
    println!("{}", reply.reply);
    if let Some(id) = reply.conversation_id {
        eprintln!("(conversation {})", id);
    }
    Ok(())
}

async fn handle_conversations(ctx: &mut CliContext) -> Result<(), CliError> {
    ctx.require_login()?;
    let conversations = ctx.client.conversations().await?;
    if conversations.is_empty() {
        println!("No conversations yet.");
    }
    for c in conversations {
        println!(
            "{:<26} {:<20} {}",
            c.id.as_deref().unwrap_or("-"),
            c.created_at.as_deref().map(|d| truncate(d, 20)).unwrap_or_default(),
            c.title.or(c.preview).map(|t| truncate(&t, 60)).unwrap_or_default(),
        );
    }
    Ok(())
}

async fn handle_recommendations(ctx: &mut CliContext) -> Result<(), CliError> {
    ctx.require_login()?;
    let recommendations = ctx.client.recommendations().await?;
    if recommendations.is_empty() {
        println!("No recommendations right now.");
    }
    for r in recommendations {
        println!("- {}", r);
    }
    Ok(())
}

async fn handle_geocode(ctx: &mut CliContext, address: String) -> Result<(), CliError> {
    match ctx.client.geocode(&address).await? {
        Some(location) => println!(
            "{:.5}, {:.5}  {}",
            location.lat,
            location.lng,
            location.address.unwrap_or_default()
        ),
        None => println!("No match for '{}'", address),
    }
    Ok(())
}

async fn handle_reverse_geocode(ctx: &mut CliContext, lat: f64, lng: f64) -> Result<(), CliError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(CliError::InputError(format!("Coordinates out of range: {}, {}", lat, lng)));
    }
    match ctx.client.reverse_geocode(lat, lng).await? {
        Some(location) => println!("{}", location.address.unwrap_or_else(|| "(no address)".to_string())),
        None => println!("No address found"),
    }
    Ok(())
}

fn handle_places(ctx: &mut CliContext, category: Option<String>, search: Option<String>) -> Result<(), CliError> {
    let mut places = Places::load(&ctx.store)?;
    places.filter.category =
        PlaceCategory::parse_filter(category.as_deref().unwrap_or("all")).map_err(CliError::InputError)?;
    places.filter.query = search.unwrap_or_default();

    let visible = places.visible();
    if visible.is_empty() {
        println!("No places match.");
    }
    for place in visible {
        println!(
            "{} {:>2}  {:<22} {:<10} {:>5} km  ★ {:.1} ({})  saves {}",
            if places.is_liked(place.id) { "♥" } else { " " },
            place.id,
            place.name,
            place.category.label(),
            place.distance_km,
            place.rating,
            place.reviews,
            format_kg(place.co2_saved_kg),
        );
    }

    let stats = places.stats();
    println!();
    println!(
        "{} places, {} saved, average rating {:.1}, {} CO₂ saved",
        stats.total,
        stats.saved,
        stats.average_rating,
        format_kg(stats.co2_saved_kg)
    );
    Ok(())
}

fn handle_like(ctx: &mut CliContext, id: u32) -> Result<(), CliError> {
    let place = places::find(id).ok_or_else(|| CliError::InputError(format!("No place with id {}", id)))?;
    let mut places = Places::load(&ctx.store)?;
    let liked = places.toggle_like(&ctx.store, id)?;
    println!("{} {}", if liked { "Saved" } else { "Removed" }, place.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_commands_are_exempt_from_session_expiry() {
        let parse = |args: &[&str]| Cli::try_parse_from(args).unwrap().command.unwrap();
        assert!(parse(&["ecotrack", "login", "--email", "a@b.c", "--password", "x"]).checks_credentials());
        assert!(parse(&["ecotrack", "change-password"]).checks_credentials());
        assert!(parse(&["ecotrack", "delete-account", "--password", "x"]).checks_credentials());
        assert!(!parse(&["ecotrack", "whoami"]).checks_credentials());
        assert!(!parse(&["ecotrack", "summary"]).checks_credentials());
    }

    #[test]
    fn test_cli_parses_log_transport() {
        let cli = Cli::try_parse_from([
            "ecotrack", "log", "transport", "--vehicle", "Car", "--distance", "12.5",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Log(LogCommand::Transport { vehicle, distance, .. })) => {
                assert_eq!(vehicle, "Car");
                assert_eq!(distance, "12.5");
            }
            _ => panic!("expected log transport"),
        }
    }

    #[test]
    fn test_cli_verbosity_flags() {
        let cli = Cli::try_parse_from(["ecotrack", "-vv", "summary"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
        assert!(matches!(cli.command, Some(Commands::Summary)));
    }

    #[test]
    fn test_cli_defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["ecotrack", "--dev"]).unwrap();
        assert!(cli.dev);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_reverse_geocode_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from(["ecotrack", "reverse-geocode", "-33.86", "151.2"]).unwrap();
        match cli.command {
            Some(Commands::ReverseGeocode { lat, lng }) => {
                assert_eq!(lat, -33.86);
                assert_eq!(lng, 151.2);
            }
            _ => panic!("expected reverse-geocode"),
        }
    }

    #[test]
    fn test_parse_category_filter() {
        assert_eq!(parse_category_filter(None).unwrap(), None);
        assert_eq!(parse_category_filter(Some("All".into())).unwrap(), None);
        assert_eq!(
            parse_category_filter(Some("energy".into())).unwrap(),
            Some(Category::Energy)
        );
        assert!(parse_category_filter(Some("boats".into())).is_err());
    }
}
