use clap::Parser;
use ledgerbot::args::{Args, Command};
use ledgerbot::{Bot, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn main_inner(args: Args) -> Result<()> {
    // This allows for running the program without hitting the Google or
    // Telegram APIs. When LEDGERBOT_IN_TEST_MODE is set and non-zero in
    // length, the mode will be Mode::Test, otherwise it will be Mode::Live.
    let mode = Mode::from_env();
    let config = Config::load(args.common().config()).await?;

    match args.command() {
        Command::Serve(serve_args) => {
            let port = serve_args.port().unwrap_or(config.port());
            let bot = Bot::new(config, mode).await?;
            ledgerbot::serve(bot, port).await
        }
    }
}

/// Initializes the tracing subscriber.
fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use the default log level for this crate only.
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
