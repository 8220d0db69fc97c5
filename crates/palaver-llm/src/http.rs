// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared request plumbing: retry on transient statuses, error shaping.

use std::time::Duration;

use palaver_core::PalaverError;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Retries after the first transient failure.
const MAX_RETRIES: u32 = 1;

/// Overall per-request timeout applied by every provider client.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// 429 and the 5xx family that usually clear on their own.
fn is_transient(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 529)
}

pub(crate) fn client_error(e: reqwest::Error) -> PalaverError {
    PalaverError::Provider {
        message: format!("failed to build HTTP client: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Sends the request built by `build`, retrying once on a transient status,
/// and decodes a successful JSON body.
///
/// `describe_error` turns a failed response body into a readable message.
pub(crate) async fn send_json<T, B, D>(
    provider: &str,
    build: B,
    describe_error: D,
) -> Result<T, PalaverError>
where
    T: DeserializeOwned,
    B: Fn() -> reqwest::RequestBuilder,
    D: Fn(&str) -> Option<String>,
{
    let mut attempt = 0;
    loop {
        let response = build().send().await.map_err(|e| PalaverError::Provider {
            message: format!("{provider}: HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        debug!(provider, status = %status, attempt, "provider response received");

        if status.is_success() {
            let body = response.text().await.map_err(|e| PalaverError::Provider {
                message: format!("{provider}: failed to read response body: {e}"),
                source: Some(Box::new(e)),
            })?;
            return serde_json::from_str(&body).map_err(|e| PalaverError::Provider {
                message: format!("{provider}: failed to parse response: {e}"),
                source: Some(Box::new(e)),
            });
        }

        let body = response.text().await.unwrap_or_default();
        if is_transient(status) && attempt < MAX_RETRIES {
            warn!(provider, status = %status, "transient error, will retry");
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(500)).await;
            continue;
        }

        let message = describe_error(&body).unwrap_or_else(|| format!("API returned {status}: {body}"));
        return Err(PalaverError::provider(format!("{provider}: {message}")));
    }
}
