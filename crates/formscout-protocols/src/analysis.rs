//! Per-site analysis outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;
use crate::page::Platform;

/// DOM-inspection depth/breadth tradeoff used for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStrategy {
    /// Every form, every field with labels and options, vendor markers.
    Comprehensive,
    /// Forms and fields only.
    FormFocused,
    /// Vendor markers and script sources, form counts only.
    PatternDetection,
    /// Counts only.
    Quick,
}

impl AnalysisStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStrategy::Comprehensive => "comprehensive",
            AnalysisStrategy::FormFocused => "form_focused",
            AnalysisStrategy::PatternDetection => "pattern_detection",
            AnalysisStrategy::Quick => "quick",
        }
    }
}

impl Default for AnalysisStrategy {
    fn default() -> Self {
        AnalysisStrategy::Comprehensive
    }
}

impl fmt::Display for AnalysisStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "comprehensive" => Ok(AnalysisStrategy::Comprehensive),
            "form_focused" | "formfocused" => Ok(AnalysisStrategy::FormFocused),
            "pattern_detection" | "patterndetection" => Ok(AnalysisStrategy::PatternDetection),
            "quick" => Ok(AnalysisStrategy::Quick),
            other => Err(format!("unknown analysis strategy: {}", other)),
        }
    }
}

/// Outcome of analyzing one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub site: String,
    pub success: bool,
    pub analysis_time_ms: u64,
    pub platform_guess: Platform,
    /// 1 - 10.
    pub complexity_score: u8,
    pub patterns: Vec<String>,
    pub forms_found: usize,
    /// Total attempts including the first one.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl AnalysisResult {
    pub fn failure(
        site: impl Into<String>,
        attempts: u32,
        elapsed_ms: u64,
        error: impl Into<String>,
        category: ErrorCategory,
    ) -> Self {
        Self {
            site: site.into(),
            success: false,
            analysis_time_ms: elapsed_ms,
            platform_guess: Platform::Unknown,
            complexity_score: 1,
            patterns: Vec::new(),
            forms_found: 0,
            attempts,
            error: Some(error.into()),
            error_category: Some(category),
        }
    }
}
