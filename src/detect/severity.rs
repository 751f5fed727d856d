//! Severity verdict for a set of detected labels.
//!
//! A label counts as waste when its lowercase form contains any keyword as a
//! substring ("plastics" matches "plastic"). The count is thresholded:
//! 0 → clean, 1–2 → moderate, 3 or more → unclean.

/// Waste vocabulary matched by substring.
pub const WASTE_KEYWORDS: &[&str] = &[
    "garbage",
    "trash",
    "waste",
    "litter",
    "debris",
    "plastic",
    "paper",
    "cardboard",
    "container",
    "bag",
    "bottle",
    "wrapper",
    "packaging",
    "cup",
];

const MODERATE_MAX: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Clean,
    Moderate,
    Unclean,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Clean => "clean",
            Severity::Moderate => "moderate",
            Severity::Unclean => "unclean",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorTag {
    Green,
    Yellow,
    Red,
}

impl ColorTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorTag::Green => "green",
            ColorTag::Yellow => "yellow",
            ColorTag::Red => "red",
        }
    }
}

/// Derived display value. Recomputed for every detection, never cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeverityVerdict {
    pub level: Severity,
    pub color: ColorTag,
    pub icon: &'static str,
    pub message: &'static str,
    /// Number of labels that matched the waste vocabulary.
    pub waste_count: usize,
}

impl SeverityVerdict {
    fn for_count(waste_count: usize) -> Self {
        let (level, color, icon, message) = match waste_count {
            0 => (Severity::Clean, ColorTag::Green, "✨", "Area is clean"),
            1..=MODERATE_MAX => (
                Severity::Moderate,
                ColorTag::Yellow,
                "⚠️",
                "Moderate waste detected",
            ),
            _ => (
                Severity::Unclean,
                ColorTag::Red,
                "🚨",
                "Significant waste detected - Needs cleaning",
            ),
        };
        Self {
            level,
            color,
            icon,
            message,
            waste_count,
        }
    }
}

pub fn is_waste_label(label: &str) -> bool {
    let normalized = label.to_lowercase();
    WASTE_KEYWORDS
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

/// Classify detected labels. Pure and total.
pub fn classify<S: AsRef<str>>(detected_classes: &[S]) -> SeverityVerdict {
    let waste_count = detected_classes
        .iter()
        .filter(|label| is_waste_label(label.as_ref()))
        .count();
    SeverityVerdict::for_count(waste_count)
}
