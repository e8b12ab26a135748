//! Knowledge record kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// The kind of a knowledge record. Immutable once a record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeKind {
    SitePattern,
    FormStructure,
    ErrorSolution,
    SuccessStrategy,
    PlatformBehavior,
    AutomationRule,
    MetaLearning,
    VelocityOptimization,
}

impl KnowledgeKind {
    pub const ALL: [KnowledgeKind; 8] = [
        KnowledgeKind::SitePattern,
        KnowledgeKind::FormStructure,
        KnowledgeKind::ErrorSolution,
        KnowledgeKind::SuccessStrategy,
        KnowledgeKind::PlatformBehavior,
        KnowledgeKind::AutomationRule,
        KnowledgeKind::MetaLearning,
        KnowledgeKind::VelocityOptimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeKind::SitePattern => "site_pattern",
            KnowledgeKind::FormStructure => "form_structure",
            KnowledgeKind::ErrorSolution => "error_solution",
            KnowledgeKind::SuccessStrategy => "success_strategy",
            KnowledgeKind::PlatformBehavior => "platform_behavior",
            KnowledgeKind::AutomationRule => "automation_rule",
            KnowledgeKind::MetaLearning => "meta_learning",
            KnowledgeKind::VelocityOptimization => "velocity_optimization",
        }
    }

    /// Relational table holding records of this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            KnowledgeKind::SitePattern => "site_patterns",
            KnowledgeKind::FormStructure => "form_structures",
            KnowledgeKind::ErrorSolution => "error_solutions",
            KnowledgeKind::SuccessStrategy => "success_strategies",
            KnowledgeKind::PlatformBehavior => "platform_behaviors",
            KnowledgeKind::AutomationRule => "automation_rules",
            KnowledgeKind::MetaLearning => "meta_learning",
            KnowledgeKind::VelocityOptimization => "velocity_optimizations",
        }
    }

    /// Fields that field-match queries may filter on. Each becomes a
    /// dedicated column in the kind's table.
    pub fn searchable_fields(&self) -> &'static [&'static str] {
        match self {
            KnowledgeKind::SitePattern => &["platform_type", "pattern_type", "site_url", "pattern_data"],
            KnowledgeKind::FormStructure => {
                &["platform_type", "site_url", "form_selector", "field_types", "question_types"]
            }
            KnowledgeKind::ErrorSolution => &[
                "error_category",
                "error_message_pattern",
                "solution_strategy",
                "platform_type",
                "input_type",
            ],
            KnowledgeKind::SuccessStrategy => &["strategy_name", "platform_type", "description"],
            KnowledgeKind::PlatformBehavior => &["platform_type", "behavior_type", "description"],
            KnowledgeKind::AutomationRule => {
                &["rule_name", "trigger_condition", "action", "platform_type"]
            }
            KnowledgeKind::MetaLearning => &["insight_type", "description", "applies_to"],
            KnowledgeKind::VelocityOptimization => {
                &["technique", "platform_type", "strategy", "site_url"]
            }
        }
    }

    pub fn is_searchable(&self, field: &str) -> bool {
        self.searchable_fields().contains(&field)
    }
}

impl fmt::Display for KnowledgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeKind {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        KnowledgeKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized || k.table_name() == normalized)
            .ok_or_else(|| KnowledgeError::InvalidInput(format!("unknown knowledge kind: {}", s)))
    }
}
