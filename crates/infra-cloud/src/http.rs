// Shared HTTP plumbing for provider gateways

use envprov_core::error::{AppError, Result};
use reqwest::{Client, Response};
use std::time::Duration;

const USER_AGENT: &str = concat!("envprov/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Pull the most useful message out of an upstream error body
///
/// Understands `{"message"}`, `{"error_description"}` and
/// `{"errors":[{"message"}]}`; anything else is returned trimmed.
pub(crate) fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.get("message"),
            value.get("error_description"),
            value.pointer("/errors/0/message"),
            value.get("error"),
        ];
        if let Some(message) = candidates.into_iter().flatten().find_map(|v| v.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Turn a non-2xx response into `"<status>: <upstream message>"`
pub(crate) async fn failure_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{}: {}", status, extract_message(&body))
}
