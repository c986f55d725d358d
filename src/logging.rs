//! Tracing setup for the client.
//!
//! The interactive TUI owns the terminal, so its logs go to a file next to
//! the local store. One-shot CLI commands log to stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Trace,
}

impl Verbosity {
    /// Map the number of `-v` flags to a verbosity.
    pub fn from_occurrences(count: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match count {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG takes precedence over the flag
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("ecotrack={}", self.to_level_filter())))
    }
}

/// Log to stderr. Used by the scriptable subcommands.
pub fn init_stderr_logging(verbosity: Verbosity) {
    let subscriber = tracing_subscriber::registry().with(verbosity.env_filter()).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time(),
    );

    let _ = subscriber.try_init();
}

/// Log to an append-only file. Used while the TUI holds the terminal.
pub fn init_file_logging(verbosity: Verbosity, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let subscriber = tracing_subscriber::registry().with(verbosity.env_filter()).with(
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true),
    );

    let _ = subscriber.try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_from_occurrences() {
        assert_eq!(Verbosity::from_occurrences(0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_occurrences(1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_occurrences(3, false), Verbosity::Trace);
        assert_eq!(Verbosity::from_occurrences(2, true), Verbosity::Quiet);
    }

    #[test]
    fn test_file_logging_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("ecotrack.log");
        init_file_logging(Verbosity::Normal, &path).unwrap();
        assert!(path.exists());
    }
}
