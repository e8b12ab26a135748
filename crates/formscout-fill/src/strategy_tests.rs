use super::*;
use formscout_config::KnowledgeConfig;
use formscout_protocols::{FieldInfo, FormInfo};

use crate::plan::SelectorCandidate;

async fn strategy(config: FillConfig) -> AdaptiveFillStrategy {
    let store = KnowledgeStore::in_memory(KnowledgeConfig::default()).await.unwrap();
    AdaptiveFillStrategy::new(Arc::new(store), config)
}

fn fill_config() -> FillConfig {
    FillConfig {
        base_wait_ms: 10,
        seed: Some(7),
        ..Default::default()
    }
}

fn text_field(id: &str, name: &str, label: &str) -> FieldInfo {
    FieldInfo {
        tag: "input".to_string(),
        input_type: "text".to_string(),
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        label: Some(label.to_string()),
        visible: true,
        ..Default::default()
    }
}

fn page(forms: Vec<FormInfo>) -> PageStructure {
    PageStructure {
        url: "https://survey.test/form".to_string(),
        forms,
        ..Default::default()
    }
}

fn survey() -> PageStructure {
    page(vec![
        FormInfo {
            selector: Some("#search".to_string()),
            fields: vec![text_field("q", "q", "Search")],
            ..Default::default()
        },
        FormInfo {
            selector: Some("#survey".to_string()),
            submit_selector: Some("#survey button".to_string()),
            fields: vec![
                text_field("age", "age", "What is your age?"),
                text_field("city", "city", "Which city do you live in?"),
            ],
            ..Default::default()
        },
    ])
}

async fn learn(strategy: &AdaptiveFillStrategy, family: SelectorFamily, successes: u32, failures: u32) {
    let rule = AutomationRulePayload {
        rule_name: SELECTOR_RULE.to_string(),
        trigger_condition: FILL_TRIGGER.to_string(),
        action: family.as_str().to_string(),
        platform_type: Platform::Typeform.as_str().to_string(),
    };
    let id = strategy
        .store
        .put(KnowledgeRecord::new(KnowledgePayload::AutomationRule(rule)))
        .await
        .unwrap();
    for _ in 0..successes {
        strategy
            .store
            .record_usage(&id, KnowledgeKind::AutomationRule, UsageOutcome::success())
            .await
            .unwrap();
    }
    for _ in 0..failures {
        strategy
            .store
            .record_usage(&id, KnowledgeKind::AutomationRule, UsageOutcome::failure())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_page_without_fields_has_no_plan() {
    let strategy = strategy(fill_config()).await;
    let empty = page(vec![FormInfo::default()]);
    let err = strategy.decide_plan(&empty, Platform::Custom).await.unwrap_err();
    assert!(matches!(err, FillError::EmptyPlan));
}

#[tokio::test]
async fn test_plan_targets_largest_form() {
    let strategy = strategy(fill_config()).await;
    let plan = strategy.decide_plan(&survey(), Platform::Custom).await.unwrap();

    assert_eq!(plan.form_selector.as_deref(), Some("#survey"));
    assert_eq!(plan.submit_selector.as_deref(), Some("#survey button"));
    assert_eq!(plan.steps.len(), 2);

    let age = &plan.steps[0];
    assert_eq!(age.intent, Intent::Demographic);
    assert_eq!(
        age.selectors,
        vec![
            SelectorCandidate { family: SelectorFamily::Id, key: "age".to_string() },
            SelectorCandidate { family: SelectorFamily::Name, key: "age".to_string() },
            SelectorCandidate { family: SelectorFamily::Label, key: "What is your age?".to_string() },
        ]
    );
    assert_eq!(age.waits_ms, vec![10, 20, 30]);
}

#[tokio::test]
async fn test_submit_disabled() {
    let strategy = strategy(FillConfig { submit: false, ..fill_config() }).await;
    let plan = strategy.decide_plan(&survey(), Platform::Custom).await.unwrap();
    assert!(plan.submit_selector.is_none());
}

#[tokio::test]
async fn test_attempts_per_field_limits_candidates() {
    let strategy = strategy(FillConfig { max_attempts_per_field: 1, ..fill_config() }).await;
    let plan = strategy.decide_plan(&survey(), Platform::Custom).await.unwrap();
    assert!(plan.steps.iter().all(|s| s.selectors.len() == 1 && s.waits_ms.len() == 1));
}

#[tokio::test]
async fn test_learned_rules_reorder_selectors() {
    let strategy = strategy(fill_config()).await;
    learn(&strategy, SelectorFamily::Id, 0, 3).await;
    learn(&strategy, SelectorFamily::Label, 3, 0).await;

    let plan = strategy.decide_plan(&survey(), Platform::Typeform).await.unwrap();
    let families: Vec<SelectorFamily> = plan.steps[0].selectors.iter().map(|c| c.family).collect();
    assert_eq!(families, vec![SelectorFamily::Label, SelectorFamily::Name, SelectorFamily::Id]);
    assert!(plan.insights.iter().any(|i| i.starts_with("selector order label>")));

    // Rules learned on another platform do not apply.
    let plan = strategy.decide_plan(&survey(), Platform::Qualtrics).await.unwrap();
    assert_eq!(plan.steps[0].selectors[0].family, SelectorFamily::Id);
}

#[tokio::test]
async fn test_unresolved_visibility_failures_lengthen_waits() {
    let strategy = strategy(fill_config()).await;
    let solution = ErrorSolutionPayload {
        error_category: ErrorCategory::VisibilityFailure.as_str().to_string(),
        error_message_pattern: "text field not visible".to_string(),
        solution_strategy: VISIBILITY_SOLUTION.to_string(),
        platform_type: "custom".to_string(),
        input_type: Some("text".to_string()),
    };
    let id = strategy
        .store
        .put(KnowledgeRecord::new(KnowledgePayload::ErrorSolution(solution)))
        .await
        .unwrap();
    for _ in 0..2 {
        strategy
            .store
            .record_usage(&id, KnowledgeKind::ErrorSolution, UsageOutcome::failure())
            .await
            .unwrap();
    }

    let plan = strategy.decide_plan(&survey(), Platform::Custom).await.unwrap();
    assert_eq!(plan.steps[0].waits_ms, vec![30, 60, 90]);
}

#[tokio::test]
async fn test_record_outcome_scores_tried_families() {
    let strategy = strategy(fill_config()).await;
    let outcome = FillOutcome {
        url: "https://survey.test/form".to_string(),
        platform: Platform::Typeform,
        success: true,
        fields: vec![FieldOutcome {
            question: "What is your age?".to_string(),
            input_type: "text".to_string(),
            filled: true,
            family: Some(SelectorFamily::Name),
            failed_families: vec![SelectorFamily::Id],
            visibility_failures: 1,
            error: None,
        }],
        submitted: true,
        elapsed_ms: 12,
        navigation_attempts: 1,
        error_category: None,
        error: None,
    };
    strategy.record_outcome(&outcome).await.unwrap();

    let learned = strategy.learned_families(Platform::Typeform).await.unwrap();
    assert_eq!(learned.get(&SelectorFamily::Name), Some(&1.0));
    assert_eq!(learned.get(&SelectorFamily::Id), Some(&0.0));

    let solutions = strategy
        .store
        .list_by_kind(KnowledgeKind::ErrorSolution)
        .await
        .unwrap();
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].stats.usage_count, 1);
    assert_eq!(solutions[0].stats.success_rate, 1.0);
    assert!(strategy.unresolved_visibility_failures().await.unwrap()["text"] == 0);
}
