// Compute provider credential exchange and cache

use crate::http::failure_message;
use envprov_core::error::{AppError, Result};
use envprov_core::port::TimeProvider;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens are refreshed this long before the upstream expiry
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// OAuth password-grant credentials
#[derive(Clone)]
pub struct PasswordGrant {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for PasswordGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGrant")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    refresh_at: i64, // epoch ms
}

/// Bearer token cache with single-flight refresh
///
/// The lock is held across the exchange, so concurrent callers that find the
/// token stale wait for one refresh instead of each starting their own.
pub struct CredentialCache {
    http: Client,
    token_url: String,
    grant: PasswordGrant,
    time_provider: Arc<dyn TimeProvider>,
    token: Mutex<Option<CachedToken>>,
}

impl CredentialCache {
    pub fn new(
        http: Client,
        token_url: impl Into<String>,
        grant: PasswordGrant,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            grant,
            time_provider,
            token: Mutex::new(None),
        }
    }

    /// Current bearer token, exchanging credentials when missing or stale
    pub async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = self.time_provider.now_millis();

        if let Some(token) = cached.as_ref() {
            if now < token.refresh_at {
                return Ok(token.access_token.clone());
            }
            debug!("Access token near expiry, refreshing");
        }

        let fresh = self.exchange().await?;
        let lifetime_ms = (fresh.expires_in - TOKEN_REFRESH_MARGIN_SECS).max(0) * 1000;
        let access_token = fresh.access_token.clone();
        *cached = Some(CachedToken {
            access_token: fresh.access_token,
            refresh_at: now + lifetime_ms,
        });

        info!(expires_in = fresh.expires_in, "Obtained compute provider access token");
        Ok(access_token)
    }

    async fn exchange(&self) -> Result<TokenResponse> {
        let form = [
            ("client_id", self.grant.client_id.as_str()),
            ("client_secret", self.grant.client_secret.as_str()),
            ("username", self.grant.username.as_str()),
            ("password", self.grant.password.as_str()),
            ("grant_type", "password"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AppError::Authentication(format!("Failed to authenticate with Contabo: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Authentication(format!(
                "Failed to authenticate with Contabo: {}",
                failure_message(response).await
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::Authentication(format!("Malformed token response from Contabo: {}", e))
        })?;

        if token.access_token.is_empty() {
            return Err(AppError::Authentication(
                "Failed to obtain access token from Contabo".to_string(),
            ));
        }
        Ok(token)
    }
}
