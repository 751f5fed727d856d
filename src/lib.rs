//! Waste Watch client
//!
//! Captures a still image from a camera or a selected file, uploads it to a
//! waste-detection backend, grades the detected labels, and keeps a local
//! replica of the backend's alert history for review.
//!
//! # Pipeline
//!
//! A capture-and-process run executes these stages in order:
//!
//! 1. **Capture**: one `Frame` from a `CaptureSource` (camera or file).
//! 2. **Compress**: downscale to the configured maximum side, re-encode as JPEG.
//! 3. **Upload**: `POST /upload` under a wall-clock budget with bounded retries.
//! 4. **Classify**: substring match of labels against the waste vocabulary.
//! 5. **Merge**: refresh the alert replica so the new alert appears.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (camera lifecycle, selected files)
//! - `compress`: Resize and JPEG re-encode
//! - `transport`: HTTP seam and backend wire formats
//! - `upload`: Retry and timeout policy for `POST /upload`
//! - `detect`: Detection results and severity verdicts
//! - `alerts`: Alert replica, views, and deletion
//! - `dashboard`: Controller state machine and summary stats

pub mod alerts;
pub mod compress;
pub mod config;
pub mod dashboard;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod transport;
pub mod upload;

pub use alerts::{Alert, AlertQuery, AlertStore, ClassFilter, SortOrder};
pub use compress::{compress, CompressedImage, CompressionSettings};
pub use config::{ClientConfig, Theme};
pub use dashboard::{
    DashboardController, DashboardSnapshot, DashboardStats, PipelineStage, ProcessOutcome,
};
pub use detect::{classify, ColorTag, DetectionResult, Severity, SeverityVerdict};
pub use error::{Error, Result};
pub use frame::Frame;
pub use ingest::{
    Camera, CameraDevice, CameraState, CaptureSource, Facing, FileSource, SelectedFile,
    SyntheticCamera,
};
pub use transport::{HttpResponse, HttpTransport, Transport, TransportError};
pub use upload::{CancelHandle, UploadClient, UploadPolicy};
