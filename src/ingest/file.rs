//! User-selected file source.
//!
//! This module provides `FileSource` for a single still chosen by the user.
//! The file source is responsible for:
//! - Reading the whole file into memory synchronously
//! - Rejecting anything whose MIME type is not `image/*`
//! - Decoding the image in-memory into a `Frame`
//!
//! The file source MUST NOT:
//! - Fetch remote URLs
//! - Write decoded frames back to disk

use image::ImageFormat;
use std::path::Path;

use super::CaptureSource;
use crate::error::{Error, Result};
use crate::frame::Frame;

const FALLBACK_MIME: &str = "application/octet-stream";

/// A file as handed over by the user: name, declared MIME type, contents.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Local file frame source.
pub struct FileSource {
    file: SelectedFile,
}

impl FileSource {
    /// Wrap a file the caller already holds in memory.
    pub fn from_selected(file: SelectedFile) -> Self {
        Self { file }
    }

    /// Read a local path. The MIME type is derived from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.to_string_lossy().contains("://") {
            return Err(Error::UnsupportedFormat(
                "file capture only supports local paths (no URL schemes)".to_string(),
            ));
        }
        let bytes = std::fs::read(path).map_err(|e| {
            Error::UnsupportedFormat(format!("failed to read {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_selected(SelectedFile {
            name,
            mime_type: mime_for_path(path).to_string(),
            bytes,
        }))
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }
}

impl CaptureSource for FileSource {
    fn acquire_frame(&mut self) -> Result<Frame> {
        if !self.file.is_image() {
            return Err(Error::UnsupportedFormat(format!(
                "{} has type {}, expected an image",
                self.file.name, self.file.mime_type
            )));
        }
        log::debug!(
            "FileSource: decoding {} ({} bytes, {})",
            self.file.name,
            self.file.bytes.len(),
            self.file.mime_type
        );
        Frame::decode(&self.file.bytes)
    }

    fn describe(&self) -> String {
        format!("file {}", self.file.name)
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}
