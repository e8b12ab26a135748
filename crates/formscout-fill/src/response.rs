//! Canned answers per intent and question type.

use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use formscout_protocols::{FieldInfo, QuestionType};

use crate::intent::Intent;

/// Value written into one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FillValue {
    Text(String),
    /// One option, by its visible label.
    Choice(String),
    /// Several options of a checkbox group.
    Choices(Vec<String>),
    /// Slider or numeric rating.
    Number(i64),
    /// Single checkbox.
    Toggle(bool),
}

const PLACEHOLDER_OPTIONS: [&str; 6] = ["", "select", "select...", "choose", "choose...", "--"];
const MODERATE_FREQUENCY: [&str; 6] = ["sometimes", "occasionally", "monthly", "weekly", "a few times", "rarely"];
const POSITIVE: [&str; 4] = ["satisfied", "good", "agree", "likely"];

fn is_placeholder(option: &str) -> bool {
    let lower = option.trim().to_lowercase();
    PLACEHOLDER_OPTIONS.contains(&lower.as_str()) || lower.starts_with("-- ") || lower.starts_with("please select")
}

/// Generates answers with a seedable RNG so runs can be reproduced.
pub struct ResponseGenerator {
    rng: StdRng,
}

impl ResponseGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Moderate rating on a 1-10 scale.
    fn rating(&mut self) -> i64 {
        self.rng.gen_range(3..=7)
    }

    pub fn respond(&mut self, field: &FieldInfo, intent: Intent, question_type: QuestionType) -> FillValue {
        let options: Vec<&String> = field.options.iter().filter(|o| !is_placeholder(o)).collect();

        match question_type {
            QuestionType::Rating => self.respond_rating(field, &options),
            QuestionType::YesNo => {
                let yes_bias = match intent {
                    Intent::Experience | Intent::Preference | Intent::Opinion => 0.7,
                    _ => 0.5,
                };
                let answer = if self.rng.gen_bool(yes_bias) { "yes" } else { "no" };
                let label = options
                    .iter()
                    .find(|o| o.trim().eq_ignore_ascii_case(answer))
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| answer.to_string());
                FillValue::Choice(label)
            }
            QuestionType::SingleChoice => match self.pick_option(intent, &options) {
                Some(option) => FillValue::Choice(option),
                None => FillValue::Text(self.text_answer(field, intent)),
            },
            QuestionType::MultipleChoice => {
                if options.len() <= 1 {
                    return FillValue::Toggle(true);
                }
                let count = self.rng.gen_range(1..=options.len().min(3));
                let mut picked: Vec<String> = options
                    .iter()
                    .map(|o| o.to_string())
                    .choose_multiple(&mut self.rng, count);
                picked.sort_by_key(|p| options.iter().position(|o| *o == p));
                FillValue::Choices(picked)
            }
            QuestionType::Text => match field.effective_type().as_str() {
                "number" => FillValue::Number(self.rating()),
                _ => FillValue::Text(self.text_answer(field, intent)),
            },
        }
    }

    fn respond_rating(&mut self, field: &FieldInfo, options: &[&String]) -> FillValue {
        let rating = self.rating();
        let numeric: Vec<(i64, &String)> = options
            .iter()
            .filter_map(|o| o.trim().parse::<i64>().ok().map(|n| (n, *o)))
            .collect();

        if !numeric.is_empty() {
            let min = numeric.iter().map(|(n, _)| *n).min().unwrap_or(0);
            let max = numeric.iter().map(|(n, _)| *n).max().unwrap_or(10);
            let target = min + ((max - min) as f64 * (rating - 1) as f64 / 9.0).round() as i64;
            let closest = numeric
                .iter()
                .min_by_key(|(n, _)| (n - target).abs())
                .map(|(_, label)| label.to_string());
            if let Some(label) = closest {
                return FillValue::Choice(label);
            }
        }
        if !options.is_empty() {
            // Worded scales run from negative to positive; stay in the middle.
            let index = (options.len() * rating as usize / 10).min(options.len() - 1);
            return FillValue::Choice(options[index].to_string());
        }
        if field.effective_type() == "range" {
            return FillValue::Number(rating * 10);
        }
        FillValue::Number(rating)
    }

    fn pick_option(&mut self, intent: Intent, options: &[&String]) -> Option<String> {
        let preferred: &[&str] = match intent {
            Intent::Frequency => &MODERATE_FREQUENCY,
            Intent::Experience | Intent::Opinion => &POSITIVE,
            _ => &[],
        };
        let matching: Vec<&&String> = options
            .iter()
            .filter(|o| {
                let lower = o.to_lowercase();
                preferred.iter().any(|p| lower.contains(p)) && !lower.contains("not") && !lower.contains("dis")
            })
            .collect();
        if let Some(option) = matching.choose(&mut self.rng) {
            return Some(option.to_string());
        }
        options.choose(&mut self.rng).map(|o| o.to_string())
    }

    fn text_answer(&mut self, field: &FieldInfo, intent: Intent) -> String {
        let question = field.question_text().to_lowercase();
        match field.effective_type().as_str() {
            "email" => return format!("respondent{}@example.com", self.rng.gen_range(100..1000)),
            "tel" => return format!("555-01{:02}", self.rng.gen_range(0..100)),
            "url" => return "https://example.com".to_string(),
            "date" => return "2024-01-15".to_string(),
            _ => {}
        }

        match intent {
            Intent::Demographic => {
                if question.contains("age") || question.contains("born") {
                    self.rng.gen_range(25..=55).to_string()
                } else if question.contains("name") {
                    "Alex Morgan".to_string()
                } else if question.contains("zip") || question.contains("postal") {
                    "10001".to_string()
                } else if question.contains("city") {
                    "Springfield".to_string()
                } else {
                    "Prefer not to say".to_string()
                }
            }
            Intent::Preference => "No strong preference, it depends on the situation.".to_string(),
            Intent::Experience => "It was a generally positive experience.".to_string(),
            Intent::Opinion => "I think it is reasonable overall.".to_string(),
            Intent::Frequency => "A few times a month.".to_string(),
            Intent::Generic => "No additional comments.".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
