//! HTTP transport to the detection backend.
//!
//! The backend is a single trusted origin exposing:
//! - `GET /health`
//! - `POST /upload`
//! - `GET /alerts/list`
//! - `POST /alerts/delete`
//! - `GET /uploads/{imagePath}` (static images)
//!
//! `Transport` is the seam between the pipeline and the network. `HttpTransport`
//! is the production implementation; tests script their own.

use std::time::Duration;

pub mod http;
pub mod wire;

pub use http::HttpTransport;
pub use wire::{
    image_url, parse_alert_list, parse_delete_response, parse_upload_response, AlertListResponse,
    DeleteRequest, StatusResponse, UploadRequest, UploadResponse,
};

pub const HEALTH_PATH: &str = "health";
pub const UPLOAD_PATH: &str = "upload";
pub const ALERTS_LIST_PATH: &str = "alerts/list";
pub const ALERTS_DELETE_PATH: &str = "alerts/delete";
pub const UPLOADS_PATH: &str = "uploads";

/// Status line and body of a completed HTTP exchange, whatever the status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures below the HTTP layer: no status line was received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// No connectivity to the origin at all.
    Offline(String),
    /// The request was aborted after exceeding its time budget.
    Timeout,
    /// Connection was attempted but failed (refused, reset, TLS).
    Connect(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Offline(detail) => write!(f, "offline: {}", detail),
            TransportError::Timeout => f.write_str("timed out"),
            TransportError::Connect(detail) => write!(f, "connection failed: {}", detail),
        }
    }
}

impl std::error::Error for TransportError {}

pub trait Transport: Send + Sync {
    /// Cheap connectivity check performed before a send.
    fn is_online(&self) -> bool;

    /// `GET {base}/{path}` bounded by `timeout`.
    fn get(&self, path: &str, timeout: Duration) -> Result<HttpResponse, TransportError>;

    /// `POST {base}/{path}` with a JSON body, bounded by `timeout`.
    fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// `GET /health`; any 2xx is healthy, anything else (including no answer) is not.
pub fn probe_health(transport: &dyn Transport, timeout: Duration) -> bool {
    match transport.get(HEALTH_PATH, timeout) {
        Ok(response) if response.is_success() => true,
        Ok(response) => {
            log::warn!("health check failed with status {}", response.status);
            false
        }
        Err(err) => {
            log::warn!("health check failed: {}", err);
            false
        }
    }
}
