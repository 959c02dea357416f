use crate::core::errors::{ApiError, CbproError};
use crate::core::kernel::transport::RawResponse;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

/// Error body returned by the API on non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default, alias = "reason", alias = "error")]
    code: Option<String>,
}

/// Deserialize a successful response body into `T`.
///
/// A body of the wrong shape is a `Decode` error carrying the raw bytes; it is
/// never turned into an empty or default value.
pub fn decode_json<T: DeserializeOwned>(path: &str, response: &RawResponse) -> Result<T, CbproError> {
    trace!(path, body = %response.body_text(), "decoding response");
    serde_json::from_slice(&response.body).map_err(|e| CbproError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
        body: response.body.clone(),
    })
}

/// Build the error for a non-2xx response.
///
/// The structured `{"message": ...}` body is parsed when present; otherwise the
/// raw body text becomes the message, or the status reason if the body is empty.
pub fn decode_api_error(path: &str, response: RawResponse) -> ApiError {
    let body = response.body_text();
    let (message, code) = match serde_json::from_slice::<ApiErrorBody>(&response.body) {
        Ok(parsed) => (parsed.message, parsed.code),
        Err(_) if body.trim().is_empty() => (status_reason(response.status), None),
        Err(_) => (body.clone(), None),
    };

    ApiError {
        status: response.status,
        message,
        code,
        path: path.to_string(),
        body,
    }
}

fn status_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map_or_else(|| format!("HTTP {}", status), str::to_string)
}
