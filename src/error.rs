//! Error taxonomy for the capture → upload → alert pipeline.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("camera not ready; start the camera before capturing")]
    CameraNotReady,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("server rejected request: {0}")]
    ServerRejected(String),

    #[error("failed to fetch alerts: {0}")]
    Fetch(String),

    #[error("failed to delete alert: {0}")]
    Delete(String),

    #[error("backend is unreachable; health check has not succeeded")]
    BackendUnreachable,

    #[error("a capture is already in flight")]
    Busy,

    #[error("upload cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Only connectivity loss and timeouts are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::NetworkUnavailable(_) | Error::Timeout { .. })
    }

    /// Single human-readable line for the dashboard error banner.
    pub fn user_message(&self) -> String {
        match self {
            Error::CameraUnavailable(_) => "Failed to access camera".to_string(),
            Error::CameraNotReady => {
                "Camera not ready. Please ensure camera is started and try again.".to_string()
            }
            Error::UnsupportedFormat(detail) => format!("Unsupported file: {}", detail),
            Error::Encode(detail) => format!("Could not prepare image: {}", detail),
            Error::NetworkUnavailable(_) => "No internet connection".to_string(),
            Error::Timeout { .. } => {
                "Request timed out. Please try again with a smaller image.".to_string()
            }
            Error::ServerError { status, message } => {
                format!("Upload failed: Server error: {} - {}", status, message)
            }
            Error::ServerRejected(reason) => format!("Upload failed: {}", reason),
            Error::Fetch(detail) => format!("Failed to fetch alerts: {}", detail),
            Error::Delete(detail) => format!("Failed to delete alert: {}", detail),
            Error::BackendUnreachable => {
                "Please ensure server is running and try again".to_string()
            }
            Error::Busy => "A capture is already being processed".to_string(),
            Error::Cancelled => "Upload cancelled".to_string(),
        }
    }
}
