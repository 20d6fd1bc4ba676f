//! Keyword classification of free-text complaints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Confidence reported when a keyword group matched.
pub const MATCH_CONFIDENCE: f64 = 0.9;

/// Confidence reported when nothing matched.
pub const NO_MATCH_CONFIDENCE: f64 = 0.5;

/// Category reported when nothing matched.
pub const NO_CATEGORY: &str = "none";

// Checked in order; the first group with a hit wins.
const KEYWORD_GROUPS: &[(&str, &[&str])] = &[
    ("corruption", &["bribe", "scam", "corrupt"]),
    ("delay", &["late", "delay", "wait"]),
    ("shortage", &["less", "missing", "shortage"]),
];

/// Handling priority of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Corruption or shortage.
    High,
    /// Delay.
    Medium,
    /// Nothing recognized.
    Low,
}

impl Priority {
    /// Priority for an analyzed category.
    pub fn for_category(category: &str) -> Self {
        match category {
            "corruption" | "shortage" => Priority::High,
            "delay" => Priority::Medium,
            _ => Priority::Low,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Result of [`analyze_complaint_text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintAnalysis {
    /// Whether any keyword group matched.
    pub issue_detected: bool,
    /// Matched group name, or `"none"`.
    pub category: String,
    /// 0.9 on a match, 0.5 otherwise.
    pub confidence: f64,
}

impl ComplaintAnalysis {
    /// Severity stored with the complaint.
    pub fn severity(&self) -> f64 {
        self.confidence
    }

    /// Priority stored with the complaint.
    pub fn priority(&self) -> Priority {
        Priority::for_category(&self.category)
    }
}

/// Classify complaint text by case-insensitive keyword substring match.
///
/// # Example
///
/// ```
/// use annsuraksha_core::complaint::analyze_complaint_text;
///
/// let result = analyze_complaint_text("Dealer asked for a BRIBE");
/// assert!(result.issue_detected);
/// assert_eq!(result.category, "corruption");
/// assert_eq!(result.confidence, 0.9);
///
/// let result = analyze_complaint_text("All good");
/// assert!(!result.issue_detected);
/// assert_eq!(result.category, "none");
/// ```
pub fn analyze_complaint_text(text: &str) -> ComplaintAnalysis {
    let lowered = text.to_lowercase();

    let hit = KEYWORD_GROUPS.iter().find(|(_, keywords)| {
        keywords
            .iter()
            .any(|keyword| lowered.contains(keyword))
    });

    match hit {
        Some((category, _)) => ComplaintAnalysis {
            issue_detected: true,
            category: (*category).to_string(),
            confidence: MATCH_CONFIDENCE,
        },
        None => ComplaintAnalysis {
            issue_detected: false,
            category: NO_CATEGORY.to_string(),
            confidence: NO_MATCH_CONFIDENCE,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_keyword() {
        let result = analyze_complaint_text("Delivery was late by 3 days");
        assert!(result.issue_detected);
        assert_eq!(result.category, "delay");
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.priority(), Priority::Medium);
    }

    #[test]
    fn test_no_keyword() {
        let result = analyze_complaint_text("Thank you");
        assert!(!result.issue_detected);
        assert_eq!(result.category, "none");
        assert_eq!(result.severity(), 0.5);
        assert_eq!(result.priority(), Priority::Low);
    }

    #[test]
    fn test_group_order_wins() {
        let result = analyze_complaint_text("they made me wait and asked for a bribe");
        assert_eq!(result.category, "corruption");
        assert_eq!(result.priority(), Priority::High);
    }

    #[test]
    fn test_shortage_is_high_priority() {
        let result = analyze_complaint_text("2kg MISSING from the bag");
        assert_eq!(result.category, "shortage");
        assert_eq!(result.priority(), Priority::High);
    }

    #[test]
    fn test_substring_match() {
        // "blessed" contains "less"
        let result = analyze_complaint_text("blessed");
        assert_eq!(result.category, "shortage");
    }
}
