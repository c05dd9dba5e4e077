//! Bot configuration, loaded from a JSON file.

use crate::{utils, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_port() -> u16 {
    8000
}

fn default_past_months() -> bool {
    true
}

/// The JSON shape of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    /// The Telegram bot API token.
    bot_token: String,
    /// Telegram user ids allowed to talk to the bot. Everyone else is denied.
    allowed_user_ids: Vec<i64>,
    /// Path to the Google OAuth client secret JSON.
    client_secret_path: PathBuf,
    /// Path to the cached OAuth token JSON.
    token_path: PathBuf,
    /// Port the webhook server listens on.
    #[serde(default = "default_port")]
    port: u16,
    /// Whether the past-month query flow is offered.
    #[serde(default = "default_past_months")]
    past_months: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    file: ConfigFile,
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let file: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Unable to load config from {}", path.display()))?;
        Ok(Self { file })
    }

    pub(crate) fn bot_token(&self) -> &str {
        &self.file.bot_token
    }

    pub(crate) fn is_allowed(&self, user_id: i64) -> bool {
        self.file.allowed_user_ids.contains(&user_id)
    }

    pub(crate) fn client_secret_path(&self) -> &Path {
        &self.file.client_secret_path
    }

    pub(crate) fn token_path(&self) -> &Path {
        &self.file.token_path
    }

    pub fn port(&self) -> u16 {
        self.file.port
    }

    pub(crate) fn past_months(&self) -> bool {
        self.file.past_months
    }

    #[cfg(test)]
    pub(crate) fn for_tests(allowed_user_ids: Vec<i64>, past_months: bool) -> Self {
        Self {
            file: ConfigFile {
                bot_token: "test-token".to_string(),
                allowed_user_ids,
                client_secret_path: PathBuf::from("client_secret.json"),
                token_path: PathBuf::from("token.json"),
                port: default_port(),
                past_months,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_and_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{
            "bot_token": "123:abc",
            "allowed_user_ids": [42],
            "client_secret_path": "/tmp/secret.json",
            "token_path": "/tmp/token.json"
        }"#;
        tokio::fs::write(&path, json).await.unwrap();
        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.bot_token(), "123:abc");
        assert_eq!(config.port(), 8000);
        assert!(config.past_months());
        assert!(config.is_allowed(42));
        assert!(!config.is_allowed(43));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("nope.json")).await.is_err());
    }
}
