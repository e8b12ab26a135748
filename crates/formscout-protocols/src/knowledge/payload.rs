//! Kind-specific typed payloads.

use serde::{Deserialize, Serialize};

use super::KnowledgeKind;

/// Structural pattern observed on a crawled site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitePatternPayload {
    pub platform_type: String,
    /// Pattern classification; defaults to `platform_type` when empty.
    pub pattern_type: String,
    pub site_url: String,
    pub pattern_data: String,
    pub form_count: u32,
    pub complexity_score: u8,
}

/// Shape of one analyzed form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormStructurePayload {
    pub platform_type: String,
    pub site_url: String,
    pub form_selector: String,
    pub field_count: u32,
    pub field_types: Vec<String>,
    pub question_types: Vec<String>,
    pub has_captcha: bool,
    pub multi_step: bool,
}

/// A failure pattern together with the strategy that resolves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorSolutionPayload {
    pub error_category: String,
    pub error_message_pattern: String,
    pub solution_strategy: String,
    pub platform_type: String,
    pub input_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessStrategyPayload {
    pub strategy_name: String,
    pub platform_type: String,
    pub description: String,
    pub steps: Vec<String>,
}

/// Timing or interaction behavior of a survey platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformBehaviorPayload {
    pub platform_type: String,
    pub behavior_type: String,
    pub description: String,
    pub timing_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationRulePayload {
    pub rule_name: String,
    pub trigger_condition: String,
    pub action: String,
    pub platform_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaLearningPayload {
    pub insight_type: String,
    pub description: String,
    pub applies_to: String,
}

/// A concurrency technique and the settings it ran with. Timings live in
/// the record metadata under the keys below, so repeat runs with the same
/// settings upsert onto one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityOptimizationPayload {
    pub technique: String,
    pub platform_type: String,
    pub strategy: String,
    /// Empty for run-level records.
    pub site_url: String,
    pub concurrency: u32,
    pub batch_size: u32,
}

impl VelocityOptimizationPayload {
    /// Metadata key: wall time of the analysis in milliseconds.
    pub const ANALYSIS_TIME_MS: &'static str = "analysis_time_ms";
    /// Metadata key: sequential time over wall time of a run.
    pub const SPEED_IMPROVEMENT: &'static str = "speed_improvement";
}

/// Typed content of a knowledge record, one variant per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum KnowledgePayload {
    SitePattern(SitePatternPayload),
    FormStructure(FormStructurePayload),
    ErrorSolution(ErrorSolutionPayload),
    SuccessStrategy(SuccessStrategyPayload),
    PlatformBehavior(PlatformBehaviorPayload),
    AutomationRule(AutomationRulePayload),
    MetaLearning(MetaLearningPayload),
    VelocityOptimization(VelocityOptimizationPayload),
}

impl KnowledgePayload {
    pub fn kind(&self) -> KnowledgeKind {
        match self {
            KnowledgePayload::SitePattern(_) => KnowledgeKind::SitePattern,
            KnowledgePayload::FormStructure(_) => KnowledgeKind::FormStructure,
            KnowledgePayload::ErrorSolution(_) => KnowledgeKind::ErrorSolution,
            KnowledgePayload::SuccessStrategy(_) => KnowledgeKind::SuccessStrategy,
            KnowledgePayload::PlatformBehavior(_) => KnowledgeKind::PlatformBehavior,
            KnowledgePayload::AutomationRule(_) => KnowledgeKind::AutomationRule,
            KnowledgePayload::MetaLearning(_) => KnowledgeKind::MetaLearning,
            KnowledgePayload::VelocityOptimization(_) => KnowledgeKind::VelocityOptimization,
        }
    }

    /// Value of a searchable field, or `None` if the field is not in this
    /// kind's allow-list.
    pub fn field(&self, name: &str) -> Option<String> {
        if !self.kind().is_searchable(name) {
            return None;
        }
        let value = match (self, name) {
            (KnowledgePayload::SitePattern(p), "platform_type") => p.platform_type.clone(),
            (KnowledgePayload::SitePattern(p), "pattern_type") => p.pattern_type.clone(),
            (KnowledgePayload::SitePattern(p), "site_url") => p.site_url.clone(),
            (KnowledgePayload::SitePattern(p), "pattern_data") => p.pattern_data.clone(),

            (KnowledgePayload::FormStructure(p), "platform_type") => p.platform_type.clone(),
            (KnowledgePayload::FormStructure(p), "site_url") => p.site_url.clone(),
            (KnowledgePayload::FormStructure(p), "form_selector") => p.form_selector.clone(),
            (KnowledgePayload::FormStructure(p), "field_types") => p.field_types.join(","),
            (KnowledgePayload::FormStructure(p), "question_types") => p.question_types.join(","),

            (KnowledgePayload::ErrorSolution(p), "error_category") => p.error_category.clone(),
            (KnowledgePayload::ErrorSolution(p), "error_message_pattern") => {
                p.error_message_pattern.clone()
            }
            (KnowledgePayload::ErrorSolution(p), "solution_strategy") => p.solution_strategy.clone(),
            (KnowledgePayload::ErrorSolution(p), "platform_type") => p.platform_type.clone(),
            (KnowledgePayload::ErrorSolution(p), "input_type") => {
                p.input_type.clone().unwrap_or_default()
            }

            (KnowledgePayload::SuccessStrategy(p), "strategy_name") => p.strategy_name.clone(),
            (KnowledgePayload::SuccessStrategy(p), "platform_type") => p.platform_type.clone(),
            (KnowledgePayload::SuccessStrategy(p), "description") => p.description.clone(),

            (KnowledgePayload::PlatformBehavior(p), "platform_type") => p.platform_type.clone(),
            (KnowledgePayload::PlatformBehavior(p), "behavior_type") => p.behavior_type.clone(),
            (KnowledgePayload::PlatformBehavior(p), "description") => p.description.clone(),

            (KnowledgePayload::AutomationRule(p), "rule_name") => p.rule_name.clone(),
            (KnowledgePayload::AutomationRule(p), "trigger_condition") => p.trigger_condition.clone(),
            (KnowledgePayload::AutomationRule(p), "action") => p.action.clone(),
            (KnowledgePayload::AutomationRule(p), "platform_type") => p.platform_type.clone(),

            (KnowledgePayload::MetaLearning(p), "insight_type") => p.insight_type.clone(),
            (KnowledgePayload::MetaLearning(p), "description") => p.description.clone(),
            (KnowledgePayload::MetaLearning(p), "applies_to") => p.applies_to.clone(),

            (KnowledgePayload::VelocityOptimization(p), "technique") => p.technique.clone(),
            (KnowledgePayload::VelocityOptimization(p), "platform_type") => p.platform_type.clone(),
            (KnowledgePayload::VelocityOptimization(p), "strategy") => p.strategy.clone(),
            (KnowledgePayload::VelocityOptimization(p), "site_url") => p.site_url.clone(),

            _ => return None,
        };
        Some(value)
    }

    /// Platform the record applies to, if the kind carries one.
    pub fn platform_type(&self) -> Option<&str> {
        let platform = match self {
            KnowledgePayload::SitePattern(p) => &p.platform_type,
            KnowledgePayload::FormStructure(p) => &p.platform_type,
            KnowledgePayload::ErrorSolution(p) => &p.platform_type,
            KnowledgePayload::SuccessStrategy(p) => &p.platform_type,
            KnowledgePayload::PlatformBehavior(p) => &p.platform_type,
            KnowledgePayload::AutomationRule(p) => &p.platform_type,
            KnowledgePayload::VelocityOptimization(p) => &p.platform_type,
            KnowledgePayload::MetaLearning(_) => return None,
        };
        if platform.is_empty() {
            None
        } else {
            Some(platform.as_str())
        }
    }

    /// Text fed to the embedding codec.
    pub fn embedding_text(&self) -> String {
        let mut parts: Vec<String> = vec![self.kind().as_str().replace('_', " ")];
        for field in self.kind().searchable_fields() {
            if let Some(value) = self.field(field) {
                if !value.is_empty() {
                    parts.push(value);
                }
            }
        }
        match self {
            KnowledgePayload::SuccessStrategy(p) => parts.extend(p.steps.iter().cloned()),
            KnowledgePayload::PlatformBehavior(p) => {
                if let Some(ms) = p.timing_ms {
                    parts.push(format!("timing {}ms", ms));
                }
            }
            _ => {}
        }
        parts.join(" ")
    }

    /// Fill derived defaults before the record is stored.
    pub fn normalize(&mut self) {
        if let KnowledgePayload::SitePattern(p) = self {
            if p.pattern_type.is_empty() {
                p.pattern_type = p.platform_type.clone();
            }
        }
    }
}
