//! These structs provide the CLI interface for the ledgerbot server.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;

/// ledgerbot: a Telegram bot front end for a Google Sheets expense ledger.
///
/// The bot records income and expense entries into monthly ledger
/// spreadsheets and answers balance and category queries. Messages arrive
/// over a Telegram webhook served by this process.
///
/// You will need a Telegram bot token and a Google OAuth client secret, both
/// referenced from the JSON configuration file.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the webhook server.
    Serve(ServeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The path to the JSON configuration file.
    #[arg(long, env = "LEDGERBOT_CONFIG", default_value = "config.json")]
    config: PathBuf,
}

impl Common {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn config(&self) -> &Path {
        &self.config
    }
}

/// Args for the `ledgerbot serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The port to listen on. Overrides the configured port.
    #[arg(long)]
    port: Option<u16>,
}

impl ServeArgs {
    pub fn port(&self) -> Option<u16> {
        self.port
    }
}
