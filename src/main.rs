use color_eyre::Result;
use clap::Parser;
use ecotrack::{
    ApiClient, Config, Profile, Session, Store,
    cli::{Cli, CliContext, Commands},
    logging::{self, Verbosity},
};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    // An explicit config file is never rewritten, so theme changes stay in memory
    let (config, saved_profile) = match &cli.config {
        Some(path) => (Config::load_from_path(&ecotrack::utils::expand_path(path))?, None),
        None => (Config::load_with_profile(profile)?, Some(profile)),
    };

    let verbosity = Verbosity::from_occurrences(cli.verbose, cli.quiet);
    let command = cli.command.unwrap_or(Commands::Tui);
    let interactive = matches!(command, Commands::Tui);

    // The TUI owns the terminal, so it logs to a file
    if interactive {
        logging::init_file_logging(verbosity, &config.get_log_path())?;
    } else {
        logging::init_stderr_logging(verbosity);
    }
    tracing::debug!(?profile, base_url = %config.api.base_url, "Configuration loaded");

    let db_path = config.get_database_path();
    let store = Store::new(
        db_path.to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?
    )?;
    let session = Session::load(&store)?;
    let client = ApiClient::new(&config.api)?.with_token(session.token().map(str::to_string));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if interactive {
        let app = ecotrack::tui::App::new(config, saved_profile, store, session, client, runtime.handle().clone())?;
        ecotrack::tui::run_event_loop(app)?;
    } else {
        let mut ctx = CliContext { config, store, session, client };
        runtime.block_on(ecotrack::cli::run(command, &mut ctx))?;
    }

    Ok(())
}
