//! Extraction quality heuristic.
//!
//! Classifies extracted text by character count, with a downgrade when the
//! text carries a known extraction-failure marker. Never fails.

use serde::Serialize;

pub const SAMPLE_CHARS: usize = 500;
const ELLIPSIS: &str = "...";
const FAILURE_MARKERS: [&str; 2] = ["Failed to extract", "Unable to extract"];

/// Ordinal quality scale, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityAssessment {
    pub text_length: usize,
    pub quality: QualityLabel,
    pub issues: Vec<String>,
    pub sample: String,
}

impl QualityAssessment {
    /// Result reported when extraction itself failed.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            text_length: 0,
            quality: QualityLabel::Poor,
            issues: vec![format!("Validation failed: {}", reason)],
            sample: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.text_length > 0
    }
}

/// Assess extracted text. Deterministic in (length, marker presence).
pub fn assess(text: &str) -> QualityAssessment {
    let text_length = text.chars().count();

    let (mut quality, mut issues) = match text_length {
        0 => (
            QualityLabel::Poor,
            vec!["no text extracted — likely image-based PDF".to_string()],
        ),
        1..=199 => (
            QualityLabel::Poor,
            vec!["very little text extracted".to_string()],
        ),
        200..=999 => (QualityLabel::Fair, vec!["limited text content".to_string()]),
        1000..=4999 => (QualityLabel::Good, Vec::new()),
        _ => (QualityLabel::Excellent, Vec::new()),
    };

    if FAILURE_MARKERS.iter().any(|marker| text.contains(marker)) {
        quality = QualityLabel::Poor;
        issues.push("extraction errors detected".to_string());
    }

    QualityAssessment {
        text_length,
        quality,
        issues,
        sample: sample(text),
    }
}

/// First 500 characters, with `...` appended when truncated.
pub fn sample(text: &str) -> String {
    match text.char_indices().nth(SAMPLE_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(len: usize) -> String {
        "a".repeat(len)
    }

    #[test]
    fn test_length_boundaries() {
        let cases = [
            (0, QualityLabel::Poor),
            (1, QualityLabel::Poor),
            (199, QualityLabel::Poor),
            (200, QualityLabel::Fair),
            (999, QualityLabel::Fair),
            (1000, QualityLabel::Good),
            (4999, QualityLabel::Good),
            (5000, QualityLabel::Excellent),
            (6000, QualityLabel::Excellent),
        ];
        for (len, expected) in cases {
            let result = assess(&text_of(len));
            assert_eq!(result.quality, expected, "length {}", len);
            assert_eq!(result.text_length, len);
        }
    }

    #[test]
    fn test_issue_strings() {
        assert_eq!(
            assess("").issues,
            vec!["no text extracted — likely image-based PDF"]
        );
        assert_eq!(assess("short").issues, vec!["very little text extracted"]);
        assert_eq!(assess(&text_of(500)).issues, vec!["limited text content"]);
        assert!(assess(&text_of(1000)).issues.is_empty());
        assert!(assess(&text_of(6000)).issues.is_empty());
    }

    #[test]
    fn test_failure_marker_forces_poor() {
        let text = format!("{} Unable to extract page 3", text_of(6000));
        let result = assess(&text);
        assert_eq!(result.quality, QualityLabel::Poor);
        assert_eq!(result.issues, vec!["extraction errors detected"]);

        let text = format!("Failed to extract {}", text_of(300));
        let result = assess(&text);
        assert_eq!(result.quality, QualityLabel::Poor);
        assert_eq!(
            result.issues,
            vec!["limited text content", "extraction errors detected"]
        );
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        let text = format!("{} failed to extract", text_of(6000));
        assert_eq!(assess(&text).quality, QualityLabel::Excellent);
    }

    #[test]
    fn test_deterministic() {
        let text = format!("{} Failed to extract", text_of(1200));
        assert_eq!(assess(&text), assess(&text));
    }

    #[test]
    fn test_sample_truncation() {
        let long: String = (0..700).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let s = sample(&long);
        assert_eq!(s.chars().count(), 503);
        assert_eq!(&s[..500], &long[..500]);
        assert!(s.ends_with("..."));

        let exact = text_of(500);
        assert_eq!(sample(&exact), exact);
        assert_eq!(sample("short"), "short");
    }

    #[test]
    fn test_sample_counts_chars_not_bytes() {
        let text = "é".repeat(501);
        let s = sample(&text);
        assert_eq!(s.chars().count(), 503);
        assert!(s.starts_with(&"é".repeat(500)));
    }

    #[test]
    fn test_failed_assessment() {
        let result = QualityAssessment::failed("PDF processing timed out after 300s");
        assert!(!result.success());
        assert_eq!(result.quality, QualityLabel::Poor);
        assert_eq!(
            result.issues,
            vec!["Validation failed: PDF processing timed out after 300s"]
        );
        assert!(result.sample.is_empty());
    }

    #[test]
    fn test_label_order_and_serde() {
        assert!(QualityLabel::Poor < QualityLabel::Fair);
        assert!(QualityLabel::Good < QualityLabel::Excellent);
        assert_eq!(
            serde_json::to_string(&QualityLabel::Excellent).unwrap(),
            "\"excellent\""
        );
        assert_eq!(QualityLabel::Fair.as_str(), "fair");
    }
}
