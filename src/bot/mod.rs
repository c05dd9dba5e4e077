//! The bot core: routes each inbound update through authorization, the escape
//! hatch, any pending conversation step, and finally command parsing.

mod allocator;
mod session;
mod steps;

use crate::api::{self, Messenger, Mode, SheetStore, Update};
use crate::{Config, Result, StepError};
use session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How long an unanswered prompt stays valid.
const SESSION_TTL: Duration = Duration::from_secs(10 * 60);

/// Any of these, sent during a prompt, cancels the conversation.
const ESCAPE_WORDS: &[&str] = &["x", "X", "exit"];

pub struct Bot {
    config: Config,
    store: Arc<dyn SheetStore>,
    messenger: Arc<dyn Messenger>,
    sessions: SessionStore,
}

impl Bot {
    pub async fn new(config: Config, mode: Mode) -> Result<Self> {
        let store = api::sheet_store(mode, &config).await?;
        let messenger = api::messenger(mode, &config);
        Ok(Self {
            config,
            store,
            messenger,
            sessions: SessionStore::new(SESSION_TTL),
        })
    }

    #[cfg(test)]
    fn with_clients(
        config: Config,
        store: Arc<dyn SheetStore>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            config,
            store,
            messenger,
            sessions: SessionStore::new(SESSION_TTL),
        }
    }

    pub(crate) fn messenger(&self) -> &dyn Messenger {
        &*self.messenger
    }

    /// Handles one inbound update. Never returns an error for anything a user
    /// can cause; backend failures are logged, reported to the chat, and the
    /// interrupted step is kept so the user can retry.
    pub(crate) async fn dispatch(&self, update: Update) -> Result<()> {
        debug!("Handling update {}", update.update_id);
        let Some(message) = update.message else {
            return Ok(());
        };
        let Some(text) = message.text else {
            return Ok(());
        };
        let chat_id = message.chat.id;
        let Some(user) = message.from_user else {
            return Ok(());
        };

        if !self.config.is_allowed(user.id) {
            warn!("User {} in chat {chat_id}: {}", user.id, StepError::Unauthorized);
            return self
                .messenger
                .send_message(
                    chat_id,
                    "Access denied!\nPlease ensure you have the right to use this bot.",
                )
                .await;
        }

        if ESCAPE_WORDS.contains(&text.trim()) {
            if self.sessions.take(chat_id).is_some() {
                self.messenger.send_message(chat_id, "See you later!").await?;
            }
            return Ok(());
        }

        // A pending prompt consumes the message before command parsing, so a
        // category literally named like a command cannot hijack the flow.
        if let Some(state) = self.sessions.take(chat_id) {
            if let Err(err) = self
                .run_step(chat_id, message.message_id, state.clone(), &text)
                .await
            {
                error!("Step failed in chat {chat_id}: {err:#}");
                self.sessions.set(chat_id, state);
                self.messenger
                    .send_message(chat_id, "Something went wrong, please try again.")
                    .await?;
            }
            return Ok(());
        }

        let Some(command) = parse_command(&text) else {
            return Ok(());
        };
        if let Err(err) = self.handle_command(chat_id, message.message_id, command).await {
            error!("Command failed in chat {chat_id}: {err:#}");
            self.messenger
                .send_message(chat_id, "Something went wrong, please try again.")
                .await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    CurrentBalance,
    CategoryExpenses,
    PastMonthExpenses,
    AddExpense,
    AddIncome,
}

/// Maps `/command` text, long or short alias, to a `Command`. Telegram may
/// suffix commands with `@botname`; the suffix is dropped.
fn parse_command(text: &str) -> Option<Command> {
    let name = text.trim().strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name {
        "start" | "help" => Some(Command::Help),
        "CurrentMonthBalance" | "CMB" | "cb" => Some(Command::CurrentBalance),
        "CheckCurrentMonthCategoryExpenses" | "CME" | "ce" => Some(Command::CategoryExpenses),
        "CheckRandomMonthCategoryExpenses" | "RME" | "re" => Some(Command::PastMonthExpenses),
        "AddExpenseToCurrentMonth" | "AECM" | "ae" => Some(Command::AddExpense),
        "AddCurrentMonthIncome" | "ACMI" | "ai" => Some(Command::AddIncome),
        _ => None,
    }
}
