//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

const STRATEGIES: [&str; 4] = ["comprehensive", "form_focused", "pattern_detection", "quick"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a `ConfigError::InvalidValue`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_browser(config, &mut result);
        Self::validate_scheduler(config, &mut result);
        Self::validate_knowledge(config, &mut result);
        Self::validate_fill(config, &mut result);

        Ok(result)
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        let browser = &config.browser;
        if browser.pool_size == 0 {
            result.add_error(ValidationError::new(
                "browser.pool_size",
                "pool_size must be greater than 0",
            ));
        }

        if browser.debug_port == 0 {
            result.add_error(ValidationError::new("browser.debug_port", "Port cannot be 0"));
        }

        if browser.navigation_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "browser.navigation_timeout_ms",
                "navigation_timeout_ms must be greater than 0",
            ));
        }

        if browser.user_agents.is_empty() {
            result.add_warning(ValidationWarning::new(
                "browser.user_agents",
                "No user agents configured, Chrome's default will be used",
            ));
        }

        if let Some(ref path) = browser.chrome_path {
            if !path.exists() {
                result.add_warning(ValidationWarning::new(
                    "browser.chrome_path",
                    format!("Chrome path does not exist: {:?}", path),
                ));
            }
        }
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let scheduler = &config.scheduler;
        if scheduler.concurrency == 0 {
            result.add_error(ValidationError::new(
                "scheduler.concurrency",
                "concurrency must be greater than 0",
            ));
        }

        if scheduler.batch_size == 0 {
            result.add_error(ValidationError::new(
                "scheduler.batch_size",
                "batch_size must be greater than 0",
            ));
        }

        if scheduler.timeout_per_site_ms == 0 {
            result.add_error(ValidationError::new(
                "scheduler.timeout_per_site_ms",
                "timeout_per_site_ms must be greater than 0",
            ));
        }

        let strategy = scheduler.strategy.to_ascii_lowercase().replace('-', "_");
        if !STRATEGIES.contains(&strategy.as_str()) {
            result.add_error(ValidationError::new(
                "scheduler.strategy",
                format!(
                    "Unknown strategy '{}', valid values: {:?}",
                    scheduler.strategy, STRATEGIES
                ),
            ));
        }

        if scheduler.concurrency > config.browser.pool_size {
            result.add_warning(ValidationWarning::new(
                "scheduler.concurrency",
                "concurrency exceeds browser.pool_size, the pool size will bound parallelism",
            ));
        }

        if scheduler.backoff.max_delay_ms < scheduler.backoff.base_delay_ms {
            result.add_error(ValidationError::new(
                "scheduler.backoff.max_delay_ms",
                "max_delay_ms must not be smaller than base_delay_ms",
            ));
        }

        if scheduler.max_retries > 10 {
            result.add_warning(ValidationWarning::new(
                "scheduler.max_retries",
                "max_retries is very high (>10), failing sites will stall batches",
            ));
        }
    }

    fn validate_knowledge(config: &Config, result: &mut ValidationResult) {
        let knowledge = &config.knowledge;
        if knowledge.embedding_dimension == 0 {
            result.add_error(ValidationError::new(
                "knowledge.embedding_dimension",
                "embedding_dimension must be greater than 0",
            ));
        }

        for (path, value) in [
            ("knowledge.similarity_threshold", knowledge.similarity_threshold),
            ("knowledge.relationship_threshold", knowledge.relationship_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                result.add_error(ValidationError::new(path, "threshold must be within [0, 1]"));
            }
        }

        if knowledge.cache_capacity == 0 {
            result.add_error(ValidationError::new(
                "knowledge.cache_capacity",
                "cache_capacity must be greater than 0",
            ));
        }

        if knowledge.field_match_limit == 0 {
            result.add_error(ValidationError::new(
                "knowledge.field_match_limit",
                "field_match_limit must be greater than 0",
            ));
        }

        if knowledge.database_path.as_os_str().is_empty() {
            result.add_error(ValidationError::new(
                "knowledge.database_path",
                "database_path cannot be empty",
            ));
        }
    }

    fn validate_fill(config: &Config, result: &mut ValidationResult) {
        if config.fill.max_attempts_per_field == 0 {
            result.add_error(ValidationError::new(
                "fill.max_attempts_per_field",
                "max_attempts_per_field must be greater than 0",
            ));
        }

        if config.fill.backoff.max_delay_ms < config.fill.backoff.base_delay_ms {
            result.add_error(ValidationError::new(
                "fill.backoff.max_delay_ms",
                "max_delay_ms must not be smaller than base_delay_ms",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
