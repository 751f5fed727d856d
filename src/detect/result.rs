use std::collections::BTreeMap;
use url::Url;

use crate::transport::image_url;

/// Outcome of one successful upload, as reported by the detection service.
///
/// Lives for the current session only; it is never written back to the alert replica.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    /// Server-side file name of the annotated image.
    pub processed_image: String,
    /// Labels in the order the detector reported them.
    pub detected_classes: Vec<String>,
    /// Per-label confidence, when the backend supplies it.
    pub confidences: BTreeMap<String, f64>,
    /// Server-side processing time, when the backend supplies it.
    pub server_timestamp: Option<String>,
}

impl DetectionResult {
    pub fn processed_image_url(&self, base_url: &Url) -> Option<Url> {
        image_url(base_url, &self.processed_image)
    }

    pub fn has_detections(&self) -> bool {
        !self.detected_classes.is_empty()
    }
}
