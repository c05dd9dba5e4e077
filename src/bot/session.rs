//! Per-chat conversation state. The source of truth for "what should the next
//! message from this chat mean": each multi-step flow is a variant of the
//! `Conversation` enum, held in a `SessionStore` keyed by chat id.
//!
//! Sessions expire after a TTL so that an abandoned prompt does not linger
//! forever. Terminal states are represented by removing the session.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// What a category choice is for: reading the category total or adding an
/// expense entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intent {
    QueryExpenses,
    AddExpense,
}

/// The state a conversation is in, together with everything the next step
/// needs. The category snapshot taken at conversation start travels inside
/// the state and is never re-fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Conversation {
    /// Waiting for a 1-based choice from the listed ledger months.
    ChooseMonth { months: Vec<String> },
    /// Waiting for a 1-based choice from the category snapshot.
    ChooseCategory {
        intent: Intent,
        ledger: String,
        categories: Vec<String>,
    },
    /// Waiting for `label: amount` text for the bound category.
    EnterEntry { ledger: String, category: String },
    /// Waiting for `label: amount` text for the fixed Income sheet.
    EnterIncome { ledger: String },
}

struct Session {
    state: Conversation,
    expires_at: Instant,
}

/// Holds at most one conversation per chat. Single authorized user, so there
/// is no contention to speak of; the mutex exists because handlers run on a
/// multi-threaded runtime.
pub(crate) struct SessionStore {
    ttl: Duration,
    inner: Mutex<HashMap<i64, Session>>,
}

impl SessionStore {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Stores the conversation state for a chat, replacing any previous one
    /// and restarting the TTL clock.
    pub(crate) fn set(&self, chat_id: i64, state: Conversation) {
        self.inner.lock().unwrap().insert(
            chat_id,
            Session {
                state,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Removes and returns the chat's conversation state. Expired sessions
    /// read as absent. Steps that loop must `set` the state back.
    pub(crate) fn take(&self, chat_id: i64) -> Option<Conversation> {
        let session = self.inner.lock().unwrap().remove(&chat_id)?;
        (session.expires_at > Instant::now()).then_some(session.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_removes_the_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.set(
            7,
            Conversation::EnterIncome {
                ledger: "2026.08".to_string(),
            },
        );
        assert!(store.take(7).is_some());
        assert!(store.take(7).is_none());
    }

    #[test]
    fn set_replaces_previous_state() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.set(
            7,
            Conversation::ChooseMonth {
                months: vec!["2026.01".to_string()],
            },
        );
        store.set(
            7,
            Conversation::EnterIncome {
                ledger: "2026.08".to_string(),
            },
        );
        assert!(matches!(
            store.take(7),
            Some(Conversation::EnterIncome { .. })
        ));
    }

    #[test]
    fn expired_sessions_read_as_absent() {
        let store = SessionStore::new(Duration::ZERO);
        store.set(
            7,
            Conversation::EnterIncome {
                ledger: "2026.08".to_string(),
            },
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.take(7).is_none());
    }
}
