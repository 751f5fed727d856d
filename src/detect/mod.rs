mod result;
mod severity;

pub use result::DetectionResult;
pub use severity::{classify, is_waste_label, ColorTag, Severity, SeverityVerdict, WASTE_KEYWORDS};
