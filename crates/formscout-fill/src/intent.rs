//! Question intent classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a question is asking about. Decides which canned answer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Demographic,
    Preference,
    Experience,
    Opinion,
    Frequency,
    Generic,
}

/// Checked in order; the first intent with a matching keyword wins.
const KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Demographic,
        &[
            "age", "gender", "income", "education", "occupation", "zip", "postal", "country",
            "city", "state", "born", "ethnicity", "marital", "household", "name", "email",
            "phone",
        ],
    ),
    (
        Intent::Frequency,
        &["how often", "frequency", "how many times", "per week", "per month", "daily", "weekly", "monthly"],
    ),
    (
        Intent::Experience,
        &["experience", "satisfied", "satisfaction", "rate your", "visit", "service", "support", "recommend"],
    ),
    (
        Intent::Preference,
        &["prefer", "favorite", "favourite", "like best", "would you rather", "choose", "interested"],
    ),
    (
        Intent::Opinion,
        &["opinion", "think", "agree", "disagree", "believe", "feel", "comment", "comments", "suggest", "suggestions"],
    ),
];

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Demographic => "demographic",
            Intent::Preference => "preference",
            Intent::Experience => "experience",
            Intent::Opinion => "opinion",
            Intent::Frequency => "frequency",
            Intent::Generic => "generic",
        }
    }

    /// Keyword-membership test over the lowercased question text. Single
    /// words must match a whole word; phrases match as substrings.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        KEYWORDS
            .iter()
            .find(|(_, keywords)| {
                keywords.iter().any(|k| {
                    if k.contains(' ') {
                        lower.contains(k)
                    } else {
                        words.contains(k)
                    }
                })
            })
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::Generic)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
