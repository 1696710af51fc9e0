//! CLI argument parsing using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Keeps DNS A records in sync with the WAN addresses of an OPNsense router.
#[derive(Debug, Parser)]
#[command(name = "wan-dyndns")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Log planned changes without writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Run a single reconciliation tick and exit
    #[arg(long)]
    pub once: bool,
}

/// Subcommands for wan-dyndns
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a configuration template
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "wan-dyndns.toml")]
        output: PathBuf,
    },
}

/// Log level selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// The matching `tracing` level.
    #[must_use]
    pub const fn as_level(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
