//! Implements the `Messenger` trait over the Telegram Bot API via `reqwest`,
//! and the serde wire types for inbound webhook updates.

use crate::api::Messenger;
use crate::Result;
use anyhow::{bail, Context};
use serde::Deserialize;

pub(super) struct TelegramMessenger {
    base_url: String,
    client: reqwest::Client,
}

impl TelegramMessenger {
    pub(super) fn new(bot_token: &str) -> Self {
        Self {
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to call Telegram method {method}"))?;
        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse Telegram {method} response"))?;
        if !status.is_success() || value["ok"] != serde_json::Value::Bool(true) {
            bail!("Telegram {method} failed with status {status}: {value}");
        }
        Ok(value)
    }
}

#[async_trait::async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call(
            "sendMessage",
            serde_json::json!({ "chat_id": chat_id, "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn reply_to(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        self.call(
            "sendMessage",
            serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "reply_parameters": { "message_id": message_id },
            }),
        )
        .await?;
        Ok(())
    }

    async fn get_me(&self) -> Result<serde_json::Value> {
        let value = self.call("getMe", serde_json::json!({})).await?;
        Ok(value.get("result").cloned().unwrap_or(value))
    }
}

/// One inbound webhook payload. Only the fields the bot acts on are kept;
/// updates without a text message are ignored by the dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Update {
    pub(crate) update_id: i64,
    pub(crate) message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IncomingMessage {
    pub(crate) message_id: i64,
    pub(crate) chat: Chat,
    #[serde(rename = "from")]
    pub(crate) from_user: Option<User>,
    pub(crate) text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Chat {
    pub(crate) id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct User {
    pub(crate) id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_update() {
        let json = r#"
        {
            "update_id": 10000,
            "message": {
                "message_id": 1365,
                "from": { "id": 1111977, "is_bot": false, "first_name": "A" },
                "chat": { "id": 1111977, "type": "private" },
                "date": 1441645532,
                "text": "/start"
            }
        }
        "#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, 10000);
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, 1111977);
        assert_eq!(message.from_user.unwrap().id, 1111977);
        assert_eq!(message.text.as_deref(), Some("/start"));
    }

    #[test]
    fn parse_update_without_message() {
        let json = r#"{ "update_id": 10001 }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert!(update.message.is_none());
    }
}
