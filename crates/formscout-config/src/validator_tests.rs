use super::*;

#[test]
fn test_validate_default_config() {
    let config = Config::default();
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validate_zero_pool_size() {
    let mut config = Config::default();
    config.browser.pool_size = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "browser.pool_size"));
}

#[test]
fn test_validate_zero_batch_size() {
    let mut config = Config::default();
    config.scheduler.batch_size = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "scheduler.batch_size"));
}

#[test]
fn test_validate_zero_concurrency() {
    let mut config = Config::default();
    config.scheduler.concurrency = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "scheduler.concurrency"));
}

#[test]
fn test_validate_unknown_strategy() {
    let mut config = Config::default();
    config.scheduler.strategy = "exhaustive".to_string();

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "scheduler.strategy"));
}

#[test]
fn test_validate_kebab_strategy_accepted() {
    let mut config = Config::default();
    config.scheduler.strategy = "form-focused".to_string();

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
}

#[test]
fn test_validate_threshold_out_of_range() {
    let mut config = Config::default();
    config.knowledge.relationship_threshold = 1.5;
    config.knowledge.similarity_threshold = -0.1;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "knowledge.relationship_threshold"));
    assert!(result.errors.iter().any(|e| e.path == "knowledge.similarity_threshold"));
}

#[test]
fn test_validate_zero_dimension() {
    let mut config = Config::default();
    config.knowledge.embedding_dimension = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "knowledge.embedding_dimension"));
}

#[test]
fn test_validate_backoff_bounds() {
    let mut config = Config::default();
    config.scheduler.backoff.base_delay_ms = 5_000;
    config.scheduler.backoff.max_delay_ms = 1_000;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "scheduler.backoff.max_delay_ms"));

    let mut config = Config::default();
    config.fill.backoff.base_delay_ms = 5_000;
    config.fill.backoff.max_delay_ms = 1_000;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "fill.backoff.max_delay_ms"));
}

#[test]
fn test_validate_concurrency_above_pool_warns() {
    let mut config = Config::default();
    config.scheduler.concurrency = 16;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "scheduler.concurrency"));
}

#[test]
fn test_validate_missing_chrome_path_warns() {
    let mut config = Config::default();
    config.browser.chrome_path = Some("/nonexistent/chrome".into());

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert!(!result.warnings.is_empty());
}

#[test]
fn test_into_result_first_error() {
    let mut config = Config::default();
    config.fill.max_attempts_per_field = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    match result.into_result() {
        Err(ConfigError::InvalidValue { field, .. }) => {
            assert_eq!(field, "fill.max_attempts_per_field")
        }
        other => panic!("expected InvalidValue, got {:?}", other),
    }
}

#[test]
fn test_validation_result_default() {
    let result = ValidationResult::default();
    assert!(result.is_valid());
    assert!(result.into_result().unwrap().is_empty());
}
