//! HTTP layer shared by every judge provider.
//!
//! Status codes and transport failures are translated into [`JudgeError`]
//! here and nowhere else; provider modules only build payloads and read
//! bodies.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use scorecard_core::{JudgeError, JudgeResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub const USER_AGENT: &str = concat!("content-scorecard/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_CHARS: usize = 300;

/// Connection details plus a pooled reqwest client.
#[derive(Clone)]
pub(crate) struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpBackend {
    pub(crate) fn new(base_url: &str, api_key: Option<&str>) -> JudgeResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(JudgeError::configuration(format!(
                "base URL must start with http:// or https://, got '{base_url}'"
            )));
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| JudgeError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.map(str::to_string),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base_url}{path}` and decode a JSON reply.
    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B, timeout: Duration) -> JudgeResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).timeout(timeout).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "judge response received");

        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, &body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        if text.trim().is_empty() {
            return Err(JudgeError::invalid_response("empty response body"));
        }
        serde_json::from_str(&text).map_err(|e| {
            JudgeError::invalid_response(format!("unexpected response shape: {e}"))
        })
    }
}

/// Map a non-success HTTP status onto the judge failure taxonomy.
pub(crate) fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> JudgeError {
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });
    match status.as_u16() {
        401 | 403 => JudgeError::Unauthorized { message },
        429 => JudgeError::RateLimited { retry_after },
        408 | 500..=599 => JudgeError::Provider {
            status: Some(status.as_u16()),
            message,
            retryable: true,
        },
        code => JudgeError::Provider {
            status: Some(code),
            message,
            retryable: false,
        },
    }
}

pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> JudgeError {
    if err.is_timeout() {
        JudgeError::Timeout { timeout }
    } else if err.is_decode() {
        JudgeError::invalid_response(format!("failed to read response body: {err}"))
    } else if err.is_builder() {
        JudgeError::configuration(format!("invalid request: {err}"))
    } else {
        // Connection refused, reset, DNS: the server may come back.
        JudgeError::Provider {
            status: None,
            message: format!("cannot reach judge provider: {err}"),
            retryable: true,
        }
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pull a human-readable message out of the common error body shapes:
/// `{"error": {"message": ...}}`, `{"error": "..."}` or plain text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        });
    let message = from_json.unwrap_or_else(|| body.to_string());
    Some(truncate(&message, MAX_ERROR_CHARS))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
