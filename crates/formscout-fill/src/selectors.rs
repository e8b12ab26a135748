//! Selector families and wait schedules.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use formscout_protocols::FieldInfo;

use crate::plan::SelectorCandidate;

/// How a field is located in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorFamily {
    Id,
    Name,
    AriaLabel,
    Label,
    Placeholder,
    CssPath,
}

impl SelectorFamily {
    /// Order used when nothing has been learned yet.
    pub const DEFAULT_ORDER: [SelectorFamily; 6] = [
        SelectorFamily::Id,
        SelectorFamily::Name,
        SelectorFamily::AriaLabel,
        SelectorFamily::Label,
        SelectorFamily::Placeholder,
        SelectorFamily::CssPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorFamily::Id => "id",
            SelectorFamily::Name => "name",
            SelectorFamily::AriaLabel => "aria_label",
            SelectorFamily::Label => "label",
            SelectorFamily::Placeholder => "placeholder",
            SelectorFamily::CssPath => "css_path",
        }
    }

    /// The field attribute this family locates by, if the field has one.
    pub fn key_for(&self, field: &FieldInfo) -> Option<String> {
        let key = match self {
            SelectorFamily::Id => field.id.as_ref(),
            SelectorFamily::Name => field.name.as_ref(),
            SelectorFamily::AriaLabel => field.aria_label.as_ref(),
            SelectorFamily::Label => field.label.as_ref(),
            SelectorFamily::Placeholder => field.placeholder.as_ref(),
            SelectorFamily::CssPath => field.css_path.as_ref(),
        }?;
        let key = key.trim();
        if key.is_empty() { None } else { Some(key.to_string()) }
    }
}

impl fmt::Display for SelectorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectorFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SelectorFamily::DEFAULT_ORDER
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| format!("unknown selector family: {}", s))
    }
}

/// Prior given to families without learned statistics.
const UNLEARNED_SCORE: f32 = 0.5;

/// Families ordered by learned success rate, best first. Families with
/// equal scores keep the default order.
pub fn rank_families(learned: &HashMap<SelectorFamily, f32>) -> Vec<SelectorFamily> {
    let mut families = SelectorFamily::DEFAULT_ORDER.to_vec();
    families.sort_by(|a, b| {
        let score = |f: &SelectorFamily| learned.get(f).copied().unwrap_or(UNLEARNED_SCORE);
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    families
}

/// Candidates for `field` in family order, skipping families the field
/// has no attribute for, at most `limit` of them.
pub fn candidates(field: &FieldInfo, order: &[SelectorFamily], limit: usize) -> Vec<SelectorCandidate> {
    order
        .iter()
        .filter_map(|family| {
            family.key_for(field).map(|key| SelectorCandidate {
                family: *family,
                key,
            })
        })
        .take(limit)
        .collect()
}

/// Wait before each attempt on a field.
///
/// Every unresolved visibility failure seen for the input type adds one
/// base wait, up to four; later attempts wait proportionally longer.
pub fn wait_schedule(base_ms: u64, unresolved_failures: u64, attempts: u32) -> Vec<u64> {
    let factor = 1 + unresolved_failures.min(4);
    (1..=u64::from(attempts)).map(|n| base_ms * factor * n).collect()
}
