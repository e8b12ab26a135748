//! Relationship type inference.
//!
//! Rules are evaluated top to bottom and the first match wins. Each rule is
//! tried on the pair as given, then reversed; a reversed match flips the
//! edge direction.

use formscout_protocols::{KnowledgeKind, RelationshipType};

pub type KindPredicate = fn(KnowledgeKind, KnowledgeKind) -> bool;

#[derive(Debug, Clone, Copy)]
pub struct RelationshipRule {
    pub name: &'static str,
    pub applies: KindPredicate,
    pub relationship: RelationshipType,
}

fn same_kind(a: KnowledgeKind, b: KnowledgeKind) -> bool {
    a == b
}

fn error_to_strategy(a: KnowledgeKind, b: KnowledgeKind) -> bool {
    a == KnowledgeKind::ErrorSolution && b == KnowledgeKind::SuccessStrategy
}

fn pattern_to_behavior(a: KnowledgeKind, b: KnowledgeKind) -> bool {
    a == KnowledgeKind::SitePattern && b == KnowledgeKind::PlatformBehavior
}

fn strategy_to_form(a: KnowledgeKind, b: KnowledgeKind) -> bool {
    a == KnowledgeKind::SuccessStrategy && b == KnowledgeKind::FormStructure
}

fn velocity_to_any(a: KnowledgeKind, _b: KnowledgeKind) -> bool {
    a == KnowledgeKind::VelocityOptimization
}

pub static RELATIONSHIP_RULES: [RelationshipRule; 5] = [
    RelationshipRule {
        name: "same_kind",
        applies: same_kind,
        relationship: RelationshipType::SimilarTo,
    },
    RelationshipRule {
        name: "error_enhances_strategy",
        applies: error_to_strategy,
        relationship: RelationshipType::Enhances,
    },
    RelationshipRule {
        name: "pattern_causes_behavior",
        applies: pattern_to_behavior,
        relationship: RelationshipType::Causes,
    },
    RelationshipRule {
        name: "strategy_requires_form",
        applies: strategy_to_form,
        relationship: RelationshipType::Requires,
    },
    RelationshipRule {
        name: "velocity_enhances",
        applies: velocity_to_any,
        relationship: RelationshipType::Enhances,
    },
];

/// Which way an inferred edge points relative to the queried pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Forward,
    Reversed,
}

pub fn infer_relationship(a: KnowledgeKind, b: KnowledgeKind) -> (RelationshipType, Orientation) {
    for rule in &RELATIONSHIP_RULES {
        if (rule.applies)(a, b) {
            return (rule.relationship, Orientation::Forward);
        }
        if (rule.applies)(b, a) {
            return (rule.relationship, Orientation::Reversed);
        }
    }
    (RelationshipType::Correlation, Orientation::Forward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use KnowledgeKind::*;

    #[test]
    fn test_same_kind_wins_first() {
        assert_eq!(
            infer_relationship(VelocityOptimization, VelocityOptimization),
            (RelationshipType::SimilarTo, Orientation::Forward)
        );
    }

    #[test]
    fn test_error_enhances_strategy_both_orders() {
        assert_eq!(
            infer_relationship(ErrorSolution, SuccessStrategy),
            (RelationshipType::Enhances, Orientation::Forward)
        );
        assert_eq!(
            infer_relationship(SuccessStrategy, ErrorSolution),
            (RelationshipType::Enhances, Orientation::Reversed)
        );
    }

    #[test]
    fn test_pattern_causes_behavior() {
        assert_eq!(
            infer_relationship(PlatformBehavior, SitePattern),
            (RelationshipType::Causes, Orientation::Reversed)
        );
    }

    #[test]
    fn test_strategy_requires_form() {
        assert_eq!(
            infer_relationship(SuccessStrategy, FormStructure),
            (RelationshipType::Requires, Orientation::Forward)
        );
    }

    #[test]
    fn test_velocity_enhances_anything() {
        assert_eq!(
            infer_relationship(MetaLearning, VelocityOptimization),
            (RelationshipType::Enhances, Orientation::Reversed)
        );
    }

    #[test]
    fn test_fallback_correlation() {
        assert_eq!(
            infer_relationship(SitePattern, ErrorSolution),
            (RelationshipType::Correlation, Orientation::Forward)
        );
    }

    #[test]
    fn test_rule_names_unique() {
        let mut names: Vec<_> = RELATIONSHIP_RULES.iter().map(|r| r.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), RELATIONSHIP_RULES.len());
    }
}
