//! Fill plans and their outcomes.

use serde::{Deserialize, Serialize};

use formscout_protocols::{ErrorCategory, Platform, QuestionType};

use crate::intent::Intent;
use crate::response::FillValue;
use crate::selectors::SelectorFamily;

/// One way of locating a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub family: SelectorFamily,
    /// Attribute value the family locates by.
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillStep {
    pub question: String,
    pub input_type: String,
    pub intent: Intent,
    pub question_type: QuestionType,
    pub required: bool,
    /// Tried in order until one fills the field.
    pub selectors: Vec<SelectorCandidate>,
    /// Wait before each selector attempt, same length as `selectors`.
    pub waits_ms: Vec<u64>,
    pub value: FillValue,
}

/// How one form is going to be filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillPlan {
    pub url: String,
    pub platform: Platform,
    pub form_selector: Option<String>,
    pub steps: Vec<FillStep>,
    /// `None` when submission is disabled or no submit control was found.
    pub submit_selector: Option<String>,
    /// Records the plan was derived from, with the reason each applied.
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOutcome {
    pub question: String,
    pub input_type: String,
    pub filled: bool,
    /// Family that filled the field.
    pub family: Option<SelectorFamily>,
    /// Families that were tried and did not work, in order.
    pub failed_families: Vec<SelectorFamily>,
    pub visibility_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillOutcome {
    pub url: String,
    pub platform: Platform,
    /// Every required field filled, at least one field filled, and the
    /// submission went through if one was attempted.
    pub success: bool,
    pub fields: Vec<FieldOutcome>,
    pub submitted: bool,
    pub elapsed_ms: u64,
    /// Page loads tried, counting retries and reloads.
    pub navigation_attempts: u32,
    /// Category of the last page-level failure, whether or not a retry
    /// got past it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    /// The page-level failure that ended the fill.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FillOutcome {
    pub fn filled_count(&self) -> usize {
        self.fields.iter().filter(|f| f.filled).count()
    }
}
