pub mod auth_client;
pub mod credential_store;
pub mod metrics;
pub mod review_client;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::config::BackendSettings;
use crate::error::{BackendError, ConsoleError, ConsoleResult};

/// Shared HTTP client for both backends; the configured timeout surfaces as a
/// transport failure.
pub fn build_http_client(settings: &BackendSettings) -> ConsoleResult<Client> {
    Client::builder()
        .timeout(settings.timeout())
        .user_agent(concat!("admin-console/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConsoleError::Internal(anyhow::anyhow!("build http client: {}", e)))
}

/// Decode a successful response, or turn a failed one into
/// [`BackendError::Status`] carrying the backend's `detail` message.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    response: Response,
) -> Result<T, BackendError> {
    let response = ensure_success(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        detail: error_detail(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
    })
}

/// Extract the `detail` field of an error body such as `{"detail": "..."}`.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Append `segments` to `base`, one path segment each. A `/` or `?` inside a
/// segment is percent-encoded and never changes which endpoint is addressed.
pub(crate) fn segment_url(base: &str, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = Url::parse(base)
        .map_err(|e| BackendError::Transport(format!("invalid backend url {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| BackendError::Transport(format!("backend url {} cannot carry a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
