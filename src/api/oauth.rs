//! Google OAuth credential files and access-token refresh.
//!
//! Two files are involved:
//! - `client_secret.json`: OAuth 2.0 client credentials from Google Cloud Console
//! - `token.json`: the access/refresh token pair obtained out-of-band
//!
//! The `TokenProvider` refreshes the access token with the `oauth2` crate when
//! it is within a few minutes of expiry and persists the result back to disk.

use crate::{utils, Result};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Refresh when the access token has less than this long to live.
const EXPIRY_BUFFER_MINUTES: i64 = 5;

/// The structure of `client_secret.json` as downloaded from Google Cloud
/// Console, with its "installed" wrapper around the actual credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct SecretFile {
    installed: InstalledCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
}

impl SecretFile {
    pub(super) async fn load(path: &Path) -> Result<Self> {
        utils::deserialize(path)
            .await
            .context("Unable to read the OAuth client secret file")
    }
}

/// How we save the token information received from Google OAuth. Our own
/// structure rather than Google's, for ergonomics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct TokenFile {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl TokenFile {
    pub(super) async fn load(path: &Path) -> Result<Self> {
        utils::deserialize(path)
            .await
            .context("Unable to read the OAuth token file")
    }

    /// Check if the token is expired or will expire soon.
    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now() + Duration::minutes(EXPIRY_BUFFER_MINUTES)
    }
}

/// Holds the OAuth credentials and hands out a valid access token, refreshing
/// and persisting it when needed.
pub(super) struct TokenProvider {
    secret: SecretFile,
    token_path: PathBuf,
    token: Mutex<TokenFile>,
}

impl TokenProvider {
    pub(super) async fn load(secret_path: &Path, token_path: &Path) -> Result<Self> {
        let secret = SecretFile::load(secret_path).await?;
        let token = TokenFile::load(token_path).await?;
        Ok(Self {
            secret,
            token_path: token_path.to_path_buf(),
            token: Mutex::new(token),
        })
    }

    /// Returns a valid access token, refreshing it first if it is near expiry.
    pub(super) async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if !token.is_expired() {
            return Ok(token.access_token.clone());
        }

        tracing::debug!("Access token expired, refreshing");
        let client = BasicClient::new(ClientId::new(self.secret.installed.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                self.secret.installed.client_secret.clone(),
            ))
            .set_auth_uri(
                AuthUrl::new(self.secret.installed.auth_uri.clone())
                    .context("Invalid auth_uri in client secret file")?,
            )
            .set_token_uri(
                TokenUrl::new(self.secret.installed.token_uri.clone())
                    .context("Invalid token_uri in client secret file")?,
            );

        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .context("Unable to build the OAuth HTTP client")?;

        let response = client
            .exchange_refresh_token(&RefreshToken::new(token.refresh_token.clone()))
            .request_async(&http)
            .await
            .context("Failed to refresh the Google access token")?;

        token.access_token = response.access_token().secret().clone();
        if let Some(rt) = response.refresh_token() {
            token.refresh_token = rt.secret().clone();
        }
        let lifetime = response
            .expires_in()
            .unwrap_or(std::time::Duration::from_secs(3600));
        token.expires_at = Utc::now()
            + Duration::from_std(lifetime).unwrap_or_else(|_| Duration::minutes(60));

        let json = serde_json::to_string_pretty(&*token).context("Failed to serialize token")?;
        utils::write(&self.token_path, json).await?;
        tracing::debug!("Token refreshed, valid until {}", token.expires_at);

        Ok(token.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_secret_file() {
        let json = r#"
        {
            "installed": {
                "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
                "client_secret": "YOUR_CLIENT_SECRET",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }
        "#;
        let tmp = tempfile::TempDir::new().unwrap();
        let p = tmp.path().join("client_secret.json");
        utils::write(&p, json).await.unwrap();
        let secret = SecretFile::load(&p).await.unwrap();
        assert_eq!(
            secret.installed.client_id,
            "YOUR_CLIENT_ID.apps.googleusercontent.com"
        );
    }

    #[tokio::test]
    async fn stale_token_is_expired() {
        let json = r#"
        {
            "access_token": "abc12",
            "refresh_token": "xyz89",
            "expires_at": "2025-01-01T00:00:00Z"
        }
        "#;
        let tmp = tempfile::TempDir::new().unwrap();
        let p = tmp.path().join("token.json");
        utils::write(&p, json).await.unwrap();
        let token = TokenFile::load(&p).await.unwrap();
        assert!(token.is_expired());
    }
}
