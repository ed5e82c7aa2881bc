//! Shared HTTP plumbing
//!
//! This module handles:
//! - Building the HTTP client with the crate's user agent and timeouts
//! - Classifying transport errors and non-2xx responses
//! - Decoding JSON bodies into typed responses

use crate::{FetchError, FetchOutcome};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest response body excerpt kept in an error
const ERROR_BODY_LIMIT: usize = 300;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `contact_email` - Optional contact address appended to the user agent
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(contact_email: Option<&str>) -> Result<Client, reqwest::Error> {
    // Format: tube-harvest/Version (+ContactEmail)
    let user_agent = match contact_email {
        Some(email) => format!("tube-harvest/{} (+{})", env!("CARGO_PKG_VERSION"), email),
        None => format!("tube-harvest/{}", env!("CARGO_PKG_VERSION")),
    };

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classifies a failed send
pub fn classify_send_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Transport("Request timeout".to_string())
    } else if err.is_connect() {
        FetchError::Transport(format!("Connection failed: {}", err))
    } else {
        FetchError::from(err)
    }
}

/// Returns true if an error body names an exhausted daily quota
///
/// `rateLimitExceeded` is a short-term throttle and stays retryable.
fn mentions_quota(body: &str) -> bool {
    ["quotaExceeded", "dailyLimitExceeded"]
        .iter()
        .any(|reason| body.contains(reason))
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= ERROR_BODY_LIMIT {
        body.to_string()
    } else {
        let cut: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{}...", cut)
    }
}

/// Checks the status and decodes a JSON body
///
/// # Status Handling
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx with valid JSON | `Ok(T)` |
/// | 2xx with malformed JSON | `Parse` |
/// | 403 / 429 naming `quotaExceeded` or `dailyLimitExceeded` | `QuotaExceeded` |
/// | Any other non-2xx | `Http` |
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> FetchOutcome<T> {
    let status = response.status();
    let body = response.text().await.map_err(classify_send_error)?;

    if !status.is_success() {
        if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
            && mentions_quota(&body)
        {
            return Err(FetchError::QuotaExceeded(excerpt(&body)));
        }
        return Err(FetchError::Http {
            status: status.as_u16(),
            body: excerpt(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
}

/// Sends a prepared request and decodes its JSON response
pub async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> FetchOutcome<T> {
    let response = request.send().await.map_err(classify_send_error)?;
    decode_json(response).await
}
