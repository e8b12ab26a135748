//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schema::Config;
use crate::validator::ConfigValidator;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load, expand and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Self::finish(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::finish(Config::default())
        }
    }

    fn finish(mut config: Config) -> Result<Config, ConfigError> {
        config.knowledge.database_path = Self::expand_pathbuf(&config.knowledge.database_path);
        config.knowledge.index_path = Self::expand_pathbuf(&config.knowledge.index_path);
        config.browser.chrome_path = config.browser.chrome_path.as_deref().map(Self::expand_pathbuf);
        config.browser.profile_dir = config.browser.profile_dir.as_deref().map(Self::expand_pathbuf);

        ConfigValidator::validate(&config)?.into_result()?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.formscout`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }

    fn expand_pathbuf(path: &Path) -> PathBuf {
        match path.to_str() {
            Some(s) => PathBuf::from(Self::expand_path(s)),
            None => path.to_path_buf(),
        }
    }

    /// Default location of the data directory.
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".formscout")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BackoffKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.browser.pool_size, 4);
        assert!(!config.knowledge.database_path.starts_with("~"));
    }

    #[test]
    fn test_load_sections() {
        let content = r#"
            [browser]
            pool_size = 2
            headless = false

            [scheduler]
            concurrency = 6
            batch_size = 3
            strategy = "quick"
            adaptive = true

            [scheduler.backoff]
            kind = "exponential"
            base_delay_ms = 100

            [knowledge]
            embedding_dimension = 256
            relationship_threshold = 0.7

            [fill]
            seed = 42
            submit = false
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.browser.pool_size, 2);
        assert!(!config.browser.headless);
        assert_eq!(config.scheduler.concurrency, 6);
        assert_eq!(config.scheduler.batch_size, 3);
        assert_eq!(config.scheduler.strategy, "quick");
        assert!(config.scheduler.adaptive);
        assert_eq!(config.scheduler.backoff.kind, BackoffKind::Exponential);
        assert_eq!(config.scheduler.backoff.base_delay_ms, 100);
        assert_eq!(config.scheduler.backoff.max_delay_ms, 10_000);
        assert_eq!(config.knowledge.embedding_dimension, 256);
        assert_eq!(config.fill.seed, Some(42));
        assert!(!config.fill.submit);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[browser]").unwrap();
        writeln!(file, "debug_port = 9333").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.browser.debug_port, 9333);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ConfigLoader::load_or_default(Path::new("/nonexistent/formscout.toml")).unwrap();
        assert_eq!(config.scheduler.batch_size, 8);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let result = ConfigLoader::load_str("[browser]\npool_size = 0\n");
        match result {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "browser.pool_size"),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: This test runs in isolation and sets a unique test-only env var
        unsafe {
            std::env::set_var("FORMSCOUT_TEST_DB", "/tmp/fs-test.db");
        }
        let content = "[knowledge]\ndatabase_path = \"${FORMSCOUT_TEST_DB}\"\n";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.knowledge.database_path, PathBuf::from("/tmp/fs-test.db"));
        unsafe {
            std::env::remove_var("FORMSCOUT_TEST_DB");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${NONEXISTENT_FORMSCOUT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/test");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/test"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        assert_eq!(ConfigLoader::expand_path("/usr/local/bin"), "/usr/local/bin");
    }

    #[test]
    fn test_data_dir() {
        assert!(ConfigLoader::data_dir().ends_with(".formscout"));
    }
}
