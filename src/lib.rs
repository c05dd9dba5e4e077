//! A Telegram bot that records income and expense entries into monthly
//! Google Sheets ledgers and answers balance and category queries.

mod api;
pub mod args;
mod bot;
mod config;
mod error;
mod model;
mod server;
mod utils;

pub use api::Mode;
pub use bot::Bot;
pub use config::Config;
pub use error::{Error, Result, StepError};
pub use server::serve;
