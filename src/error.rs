//! Error types. Plumbing errors are `anyhow`; conversation-step outcomes that
//! the bot must distinguish (loop vs. terminate) get their own taxonomy.

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The recoverable conditions a conversation step can end in. None of these is
/// fatal to the process: each is converted to a user-facing message at the
/// step boundary.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A ledger (monthly spreadsheet) could not be found. Ends the conversation.
    #[error("ledger '{0}' was not found")]
    NotFound(String),

    /// Bad numeric or category input. The conversation loops back to the same step.
    #[error("{0}")]
    Validation(String),

    /// Free-text entry had the wrong shape. The conversation loops back.
    #[error("{0}")]
    Format(String),

    /// The sender is not in the allowed user set. No state change.
    #[error("access denied")]
    Unauthorized,
}
