//! Shared HTTP response handling for the backend clients.

use crate::errors::StoreError;

/// Turn a non-success response into a [`StoreError::ApiError`] carrying the
/// response body.
pub(crate) async fn check_response(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::ApiError {
        service,
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON response body, reporting failures as [`StoreError::Decode`].
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<T, StoreError> {
    resp.json().await.map_err(|e| StoreError::Decode {
        service,
        detail: e.to_string(),
    })
}
