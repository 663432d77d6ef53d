//! ArcGIS Online token generation.

use std::fmt;

use chrono::{DateTime, Utc};
use eventmap_core::config::ArcgisConfig;
use eventmap_core::{SyncError, SyncResult};
use serde::Deserialize;
use tracing::info;

use super::read_json;

#[derive(Clone)]
pub struct Token {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(value: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Token { value, expires_at }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
    /// Milliseconds since the epoch.
    expires: Option<i64>,
}

/// Exchange the configured username/password for a token.
pub async fn generate(client: &reqwest::Client, cfg: &ArcgisConfig) -> SyncResult<Token> {
    let url = cfg.token_url()?;
    let referer = cfg.referer()?;

    let response = client
        .post(url)
        .form(&[
            ("username", cfg.username.as_str()),
            ("password", cfg.password.as_str()),
            ("referer", referer.as_str()),
            ("f", "json"),
        ])
        .send()
        .await
        .map_err(|e| SyncError::Auth(e.to_string()))?;

    let body: TokenResponse = read_json(response)
        .await
        .map_err(|e| SyncError::Auth(e.to_string()))?;

    let value = body
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SyncError::Auth("generateToken returned no token".into()))?;

    let token = Token::new(value, body.expires.and_then(DateTime::from_timestamp_millis));

    match token.expires_at() {
        Some(expires_at) => info!(user = %cfg.username, %expires_at, "got ArcGIS token"),
        None => info!(user = %cfg.username, "got ArcGIS token"),
    }

    Ok(token)
}
