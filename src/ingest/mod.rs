//! Still-frame capture sources.
//!
//! This module provides two sources for a single raw frame:
//! - A live camera, through a `CameraDevice` collaborator (`camera`)
//! - A user-selected image file, read into memory (`file`)
//!
//! Both produce a `Frame` that flows into the compressor.
//! The ingestion layer MUST NOT:
//! - Start a camera implicitly when a frame is requested
//! - Retry after a capture failure (permission denials and bad files do not heal)
//! - Log raw frame content

use serde::Deserialize;

use crate::error::Result;
use crate::frame::Frame;

pub mod camera;
pub mod file;

pub use camera::{
    Camera, CameraDevice, CameraSession, CameraState, MediaStream, MediaTrack, StreamRequest,
    SyntheticCamera, TrackKind,
};
pub use file::{FileSource, SelectedFile};

/// Anything that can hand over one still frame.
pub trait CaptureSource {
    /// Acquire a single frame. Failures are terminal for the current run.
    fn acquire_frame(&mut self) -> Result<Frame>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Camera orientation selector.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera.
    #[default]
    Environment,
    /// Front camera.
    User,
}

impl Facing {
    pub fn opposite(self) -> Self {
        match self {
            Facing::Environment => Facing::User,
            Facing::User => Facing::Environment,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Environment => "environment",
            Facing::User => "user",
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Facing {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "environment" | "rear" | "back" => Ok(Facing::Environment),
            "user" | "front" => Ok(Facing::User),
            other => Err(format!(
                "unknown facing mode '{}'; expected environment or user",
                other
            )),
        }
    }
}
