//! HTTP transport for providers
//!
//! - Client construction from [`HttpSettings`]
//! - Transport-level retries with exponential backoff and jitter
//! - Mapping of HTTP status classes onto [`WalletError`] codes

use rand::Rng;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

use crate::error::{WalletError, WalletResult};
use crate::utils::network_config::HttpSettings;

pub fn build_client(settings: &HttpSettings) -> WalletResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(settings.user_agent.clone())
        .build()
        .map_err(|e| WalletError::configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> WalletResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            WalletError::network("Malformed provider response").with_details(e.to_string())
        })
    }

    /// Generic error for a non-success reply. Server-side and throttling
    /// statuses are transient; other client errors mean the request itself
    /// was refused.
    pub fn status_error(&self, endpoint: &str) -> WalletError {
        let details = format!("HTTP {} from {}: {}", self.status, endpoint, truncate(&self.body));
        match self.status {
            408 | 429 | 500..=599 => WalletError::network("Provider unavailable").with_details(details),
            _ => WalletError::rejected("Request rejected").with_details(details),
        }
    }
}

fn truncate(body: &str) -> &str {
    let limit = 300;
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Send a request, retrying connect and timeout failures.
///
/// `request` is invoked once per attempt since a `RequestBuilder` cannot be
/// reused.
pub async fn send_with_retry<F>(
    settings: &HttpSettings,
    endpoint: &str,
    request: F,
) -> WalletResult<HttpReply>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        match request().send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await?;
                return Ok(HttpReply { status, body });
            }
            Err(e) if (e.is_connect() || e.is_timeout()) && attempt < settings.transport_retries => {
                attempt += 1;
                let delay =
                    calculate_backoff(attempt, settings.backoff_base_ms, settings.backoff_max_ms);
                warn!(
                    endpoint,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transport error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
