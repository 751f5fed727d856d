//! JSON payloads exchanged with the detection backend.
//!
//! Every endpoint answers with a `status` discriminator. `"success"` is the only
//! accepted value; anything else carries a reason in `error` or `message`, and
//! that can happen at HTTP 200 as well as on a non-2xx status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use super::{HttpResponse, UPLOADS_PATH};
use crate::alerts::Alert;
use crate::detect::DetectionResult;
use crate::error::{Error, Result};

const STATUS_SUCCESS: &str = "success";
const MAX_REASON_CHARS: usize = 200;

/// `POST /upload` body.
#[derive(Debug, Serialize)]
pub struct UploadRequest<'a> {
    /// Data URL, `data:image/jpeg;base64,...`.
    pub image: &'a str,
}

/// `POST /alerts/delete` body.
#[derive(Debug, Serialize)]
pub struct DeleteRequest<'a> {
    pub timestamp: &'a str,
}

/// Generic `{ status, message | error }` envelope.
#[derive(Debug, Deserialize, Default)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(STATUS_SUCCESS)
    }

    /// Server-supplied reason, preferring `error` over `message`.
    pub fn reason(&self) -> Option<String> {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .filter(|reason| !reason.trim().is_empty())
    }
}

/// `POST /upload` response.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub processed_image: Option<String>,
    #[serde(default)]
    pub detected_classes: Vec<String>,
    #[serde(default)]
    pub confidences: BTreeMap<String, f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /alerts/list` response.
#[derive(Debug, Deserialize)]
pub struct AlertListResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Interpret an upload exchange.
///
/// - non-2xx → `ServerError(status)` with whatever reason the body gives
/// - 2xx with a non-success discriminator → `ServerRejected(reason)`
/// - 2xx success → `DetectionResult`
pub fn parse_upload_response(response: &HttpResponse) -> Result<DetectionResult> {
    if !response.is_success() {
        return Err(Error::ServerError {
            status: response.status,
            message: failure_reason(&response.body),
        });
    }
    let parsed: UploadResponse = serde_json::from_str(&response.body)
        .map_err(|e| Error::ServerRejected(format!("invalid response body: {}", e)))?;

    if parsed.status.as_deref() != Some(STATUS_SUCCESS) {
        let reason = parsed
            .error
            .or(parsed.message)
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| "Processing failed".to_string());
        return Err(Error::ServerRejected(reason));
    }

    let processed_image = parsed
        .processed_image
        .filter(|path| !path.trim().is_empty())
        .ok_or_else(|| Error::ServerRejected("response missing processed_image".to_string()))?;

    Ok(DetectionResult {
        processed_image,
        detected_classes: parsed.detected_classes,
        confidences: parsed.confidences,
        server_timestamp: parsed.timestamp,
    })
}

/// Interpret an alert list exchange.
pub fn parse_alert_list(response: &HttpResponse) -> Result<Vec<Alert>> {
    if !response.is_success() {
        return Err(Error::Fetch(format!(
            "status {}: {}",
            response.status,
            failure_reason(&response.body)
        )));
    }
    let parsed: AlertListResponse = serde_json::from_str(&response.body)
        .map_err(|e| Error::Fetch(format!("invalid alert list: {}", e)))?;
    if parsed.status.as_deref() != Some(STATUS_SUCCESS) {
        return Err(Error::Fetch(
            parsed
                .message
                .or(parsed.error)
                .unwrap_or_else(|| "Failed to fetch alerts".to_string()),
        ));
    }
    Ok(parsed.alerts)
}

/// Interpret an alert delete exchange.
pub fn parse_delete_response(response: &HttpResponse) -> Result<()> {
    if !response.is_success() {
        return Err(Error::Delete(format!(
            "status {}: {}",
            response.status,
            failure_reason(&response.body)
        )));
    }
    let parsed: StatusResponse = serde_json::from_str(&response.body)
        .map_err(|e| Error::Delete(format!("invalid delete response: {}", e)))?;
    if !parsed.is_success() {
        return Err(Error::Delete(
            parsed
                .reason()
                .unwrap_or_else(|| "Failed to delete alert".to_string()),
        ));
    }
    Ok(())
}

/// URL of a stored image (`GET /uploads/{imagePath}`).
///
/// Returns `None` for empty paths and paths that try to leave the uploads directory.
pub fn image_url(base_url: &Url, image_path: &str) -> Option<Url> {
    let name = image_path.trim().trim_start_matches('/');
    if name.is_empty() || name.split('/').any(|segment| segment == "..") {
        return None;
    }
    base_url
        .join(&format!("{}/", UPLOADS_PATH))
        .and_then(|uploads| uploads.join(name))
        .ok()
}

fn failure_reason(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<StatusResponse>(body) {
        if let Some(reason) = parsed.reason() {
            return reason;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    trimmed.chars().take(MAX_REASON_CHARS).collect()
}
