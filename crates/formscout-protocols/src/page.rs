//! Detected page structure.
//!
//! Produced by the analysis scripts evaluated in the page; field names
//! follow the camelCase JSON the scripts emit.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Survey/form platform a page was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Typeform,
    SurveyMonkey,
    GoogleForms,
    Qualtrics,
    JotForm,
    MicrosoftForms,
    Wufoo,
    Formstack,
    /// Forms present but no known vendor signature.
    Custom,
    Unknown,
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Unknown
    }
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Typeform => "typeform",
            Platform::SurveyMonkey => "surveymonkey",
            Platform::GoogleForms => "google_forms",
            Platform::Qualtrics => "qualtrics",
            Platform::JotForm => "jotform",
            Platform::MicrosoftForms => "microsoft_forms",
            Platform::Wufoo => "wufoo",
            Platform::Formstack => "formstack",
            Platform::Custom => "custom",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the answer a field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    YesNo,
    Text,
    Rating,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::YesNo => "yes_no",
            QuestionType::Text => "text",
            QuestionType::Rating => "rating",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const RATING_WORDS: [&str; 4] = ["rate", "rating", "scale of", "how likely"];

/// One input-like element inside a form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldInfo {
    pub tag: String,
    pub input_type: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub aria_label: Option<String>,
    pub css_path: Option<String>,
    pub required: bool,
    pub visible: bool,
    pub options: Vec<String>,
}

impl FieldInfo {
    /// Best human-readable text describing the field.
    pub fn question_text(&self) -> String {
        self.label
            .as_deref()
            .or(self.aria_label.as_deref())
            .or(self.placeholder.as_deref())
            .or(self.name.as_deref())
            .unwrap_or("")
            .to_string()
    }

    /// Input type with the tag folded in (`select`, `textarea`, ...).
    pub fn effective_type(&self) -> String {
        match self.tag.to_ascii_lowercase().as_str() {
            "select" => "select".to_string(),
            "textarea" => "textarea".to_string(),
            _ if self.input_type.is_empty() => "text".to_string(),
            _ => self.input_type.to_ascii_lowercase(),
        }
    }

    /// Answer shape inferred from the input type, options and wording.
    pub fn question_type(&self) -> QuestionType {
        let text = self.question_text().to_ascii_lowercase();
        let mentions_rating = RATING_WORDS.iter().any(|w| text.contains(w));
        let options: Vec<String> = self
            .options
            .iter()
            .map(|o| o.trim().to_ascii_lowercase())
            .filter(|o| !o.is_empty())
            .collect();
        let yes_no = options.len() == 2 && options.iter().all(|o| o == "yes" || o == "no");
        let numeric = !options.is_empty() && options.iter().all(|o| o.parse::<f64>().is_ok());

        match self.effective_type().as_str() {
            "checkbox" => QuestionType::MultipleChoice,
            "radio" | "select" if yes_no => QuestionType::YesNo,
            "radio" | "select" if numeric || mentions_rating => QuestionType::Rating,
            "radio" | "select" => QuestionType::SingleChoice,
            "range" => QuestionType::Rating,
            "number" if mentions_rating => QuestionType::Rating,
            _ => QuestionType::Text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormInfo {
    pub selector: Option<String>,
    pub action: Option<String>,
    pub method: Option<String>,
    pub fields: Vec<FieldInfo>,
    pub submit_selector: Option<String>,
}

/// Structure of a page as reported by an analysis script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageStructure {
    pub url: String,
    pub title: String,
    pub forms: Vec<FormInfo>,
    pub script_sources: Vec<String>,
    /// Vendor-revealing class names, ids and meta generator values.
    pub markers: Vec<String>,
    pub has_captcha: bool,
    pub multi_step: bool,
    pub iframe_count: u32,
    /// Field count reported by scripts that skip per-field detail.
    pub field_count_hint: Option<u32>,
}

impl PageStructure {
    pub fn field_count(&self) -> usize {
        let listed: usize = self.forms.iter().map(|f| f.fields.len()).sum();
        if listed == 0 {
            self.field_count_hint.unwrap_or(0) as usize
        } else {
            listed
        }
    }

    pub fn input_types(&self) -> BTreeSet<String> {
        self.forms
            .iter()
            .flat_map(|f| f.fields.iter().map(FieldInfo::effective_type))
            .collect()
    }

    pub fn has_forms(&self) -> bool {
        !self.forms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(tag: &str, input_type: &str, label: &str, options: &[&str]) -> FieldInfo {
        FieldInfo {
            tag: tag.to_string(),
            input_type: input_type.to_string(),
            label: Some(label.to_string()),
            options: options.iter().map(|o| o.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_question_types() {
        assert_eq!(field("input", "checkbox", "Pick any", &[]).question_type(), QuestionType::MultipleChoice);
        assert_eq!(field("select", "", "Subscribed?", &["Yes", "No"]).question_type(), QuestionType::YesNo);
        assert_eq!(field("select", "", "Score", &["1", "2", "3"]).question_type(), QuestionType::Rating);
        assert_eq!(
            field("input", "radio", "How likely are you to recommend us?", &[]).question_type(),
            QuestionType::Rating
        );
        assert_eq!(field("select", "", "Country", &["France", "Peru"]).question_type(), QuestionType::SingleChoice);
        assert_eq!(field("input", "range", "Volume", &[]).question_type(), QuestionType::Rating);
        assert_eq!(field("textarea", "", "Comments", &[]).question_type(), QuestionType::Text);
        assert_eq!(field("input", "", "Name", &[]).question_type(), QuestionType::Text);
    }

    #[test]
    fn test_question_text_fallbacks() {
        let f = FieldInfo {
            placeholder: Some("Your email".to_string()),
            name: Some("email".to_string()),
            ..Default::default()
        };
        assert_eq!(f.question_text(), "Your email");
        assert_eq!(f.effective_type(), "text");
    }

    #[test]
    fn test_field_count_hint_used_without_fields() {
        let page = PageStructure {
            forms: vec![FormInfo::default()],
            field_count_hint: Some(7),
            ..Default::default()
        };
        assert_eq!(page.field_count(), 7);
        assert!(page.has_forms());
    }

    #[test]
    fn test_page_structure_camel_case() {
        let json = r#"{"url":"https://a.test","forms":[{"fields":[{"tag":"input","inputType":"email","ariaLabel":"Email"}]}],"hasCaptcha":true,"iframeCount":2}"#;
        let page: PageStructure = serde_json::from_str(json).unwrap();
        assert!(page.has_captcha);
        assert_eq!(page.iframe_count, 2);
        assert_eq!(page.forms[0].fields[0].effective_type(), "email");
        assert_eq!(page.forms[0].fields[0].question_text(), "Email");
    }
}
