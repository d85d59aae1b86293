//! Request plumbing shared by the HTTP host clients.

use super::UploadPayload;
use crate::error::HostError;
use reqwest::multipart::Part;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Wrap the payload as a multipart file part
pub(super) fn file_part(host: &str, payload: &UploadPayload) -> Result<Part, HostError> {
    let part = Part::bytes(payload.bytes.to_vec()).file_name(payload.file_name.clone());

    match &payload.mime_type {
        Some(mime) => part.mime_str(mime).map_err(|e| HostError::Request {
            host: host.to_string(),
            source: e,
        }),
        None => Ok(part),
    }
}

/// Check the status and decode a JSON body
pub(super) async fn read_json<T: DeserializeOwned>(
    host: &str,
    resp: reqwest::Response,
) -> Result<T, HostError> {
    let status = resp.status();
    let text = resp.text().await.map_err(|e| HostError::Request {
        host: host.to_string(),
        source: e,
    })?;

    if !status.is_success() {
        return Err(HostError::Status {
            host: host.to_string(),
            status: status.as_u16(),
            body: truncate(&text),
        });
    }

    serde_json::from_str(&text).map_err(|e| HostError::InvalidResponse {
        host: host.to_string(),
        reason: format!("{}: {}", e, truncate(&text)),
    })
}

/// Issue a DELETE against the delete URL handed out at upload time.
///
/// 404 and 410 mean the asset is already gone, which counts as deleted.
pub(super) async fn delete_url(
    client: &reqwest::Client,
    host: &str,
    url: &str,
    timeout: Duration,
) -> Result<(), HostError> {
    let resp = client
        .delete(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| HostError::Request {
            host: host.to_string(),
            source: e,
        })?;

    let status = resp.status();
    if is_deleted(status) {
        tracing::debug!(host, status = status.as_u16(), "hosted asset deleted");
        return Ok(());
    }

    let body = resp.text().await.unwrap_or_default();
    Err(HostError::Status {
        host: host.to_string(),
        status: status.as_u16(),
        body: truncate(&body),
    })
}

fn is_deleted(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
