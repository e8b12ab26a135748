//! Platform detection, complexity scoring and pattern extraction.

use formscout_protocols::{PageStructure, Platform};
use url::Url;

/// Host suffixes (and an optional path prefix) identifying a platform.
const HOST_RULES: &[(&str, Option<&str>, Platform)] = &[
    ("typeform.com", None, Platform::Typeform),
    ("surveymonkey.com", None, Platform::SurveyMonkey),
    ("surveymonkey.co.uk", None, Platform::SurveyMonkey),
    ("docs.google.com", Some("/forms"), Platform::GoogleForms),
    ("forms.gle", None, Platform::GoogleForms),
    ("qualtrics.com", None, Platform::Qualtrics),
    ("jotform.com", None, Platform::JotForm),
    ("forms.office.com", None, Platform::MicrosoftForms),
    ("forms.microsoft.com", None, Platform::MicrosoftForms),
    ("wufoo.com", None, Platform::Wufoo),
    ("formstack.com", None, Platform::Formstack),
];

/// Lowercase needles looked for in markers and script sources.
const CONTENT_RULES: &[(&str, Platform)] = &[
    ("typeform", Platform::Typeform),
    ("surveymonkey", Platform::SurveyMonkey),
    ("freebirdform", Platform::GoogleForms),
    ("google forms", Platform::GoogleForms),
    ("qualtrics", Platform::Qualtrics),
    ("jotform", Platform::JotForm),
    ("office-form", Platform::MicrosoftForms),
    ("microsoft forms", Platform::MicrosoftForms),
    ("wufoo", Platform::Wufoo),
    ("formstack", Platform::Formstack),
];

fn host_matches(host: &str, suffix: &str) -> bool {
    host == suffix || host.ends_with(&format!(".{}", suffix))
}

fn platform_from_url(site: &str) -> Option<Platform> {
    let url = Url::parse(site).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    HOST_RULES
        .iter()
        .find(|(suffix, path, _)| {
            host_matches(&host, suffix) && path.is_none_or(|p| url.path().starts_with(p))
        })
        .map(|(_, _, platform)| *platform)
}

fn platform_from_content(page: &PageStructure) -> Option<Platform> {
    let haystack: Vec<String> = page
        .markers
        .iter()
        .chain(page.script_sources.iter())
        .map(|s| s.to_ascii_lowercase())
        .collect();
    CONTENT_RULES
        .iter()
        .find(|(needle, _)| haystack.iter().any(|h| h.contains(needle)))
        .map(|(_, platform)| *platform)
}

/// Guess the survey platform from the URL first, then page content.
///
/// Pages with forms or fields but no vendor signature are `Custom`;
/// anything else is `Unknown`.
pub fn detect_platform(site: &str, page: &PageStructure) -> Platform {
    platform_from_url(site)
        .or_else(|| platform_from_url(&page.url))
        .or_else(|| platform_from_content(page))
        .unwrap_or(if page.has_forms() || page.field_count() > 0 {
            Platform::Custom
        } else {
            Platform::Unknown
        })
}

/// Score in 1..=10 from form and field counts, input-type diversity,
/// captcha, multi-step markers and iframes.
pub fn complexity_score(page: &PageStructure) -> u8 {
    let forms = page.forms.len().min(3);
    let fields = match page.field_count() {
        0 => 0,
        1..=5 => 1,
        6..=15 => 2,
        _ => 3,
    };
    let diverse = usize::from(page.input_types().len() > 3);
    let score = 1
        + forms
        + fields
        + diverse
        + usize::from(page.has_captcha)
        + usize::from(page.multi_step)
        + usize::from(page.iframe_count > 0);
    score.clamp(1, 10) as u8
}

/// Reusable observations about the page, as `key=value` strings.
///
/// A page without forms or fields yields no patterns.
pub fn extract_patterns(page: &PageStructure, platform: Platform) -> Vec<String> {
    let field_count = page.field_count();
    if !page.has_forms() && field_count == 0 {
        return Vec::new();
    }

    let mut patterns = vec![
        format!("platform={}", platform),
        format!("form_count={}", page.forms.len()),
        format!("field_count={}", field_count),
    ];
    let input_types = page.input_types();
    if !input_types.is_empty() {
        patterns.push(format!(
            "input_types={}",
            input_types.into_iter().collect::<Vec<_>>().join(",")
        ));
    }
    let required = page
        .forms
        .iter()
        .flat_map(|f| f.fields.iter())
        .filter(|f| f.required)
        .count();
    if required > 0 {
        patterns.push(format!("required_fields={}", required));
    }
    if page.has_captcha {
        patterns.push("captcha".to_string());
    }
    if page.multi_step {
        patterns.push("multi_step".to_string());
    }
    if page.iframe_count > 0 {
        patterns.push(format!("iframes={}", page.iframe_count));
    }
    patterns
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
