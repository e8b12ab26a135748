//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub fill: FillConfig,
}

/// Browser pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Number of isolated contexts kept in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Remote debugging port for the launched Chrome.
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Explicit Chrome binary; searched for when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,

    /// Candidate user agents; each pool slot draws one at random.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Chrome user data directory; a temporary one is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            headless: true,
            debug_port: default_debug_port(),
            chrome_path: None,
            user_agents: default_user_agents(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            profile_dir: None,
        }
    }
}

fn default_pool_size() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_debug_port() -> u16 {
    9222
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Site analysis scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum analyses in flight within one batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_timeout_per_site_ms")]
    pub timeout_per_site_ms: u64,

    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// One of `comprehensive`, `form_focused`, `pattern_detection`, `quick`.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Tune concurrency and timeouts from stored knowledge before a run.
    #[serde(default)]
    pub adaptive: bool,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            timeout_per_site_ms: default_timeout_per_site_ms(),
            max_retries: default_max_retries(),
            strategy: default_strategy(),
            adaptive: false,
            backoff: BackoffConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_batch_size() -> usize {
    8
}

fn default_timeout_per_site_ms() -> u64 {
    45_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_strategy() -> String {
    "comprehensive".to_string()
}

/// Growth of the delay between retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default)]
    pub kind: BackoffKind,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: BackoffKind::default(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

/// Knowledge store and graph configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Vector index snapshot file.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Records kept in the in-memory LRU cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Similarity results must score strictly above this.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Minimum strength for a graph edge to be kept.
    #[serde(default = "default_relationship_threshold")]
    pub relationship_threshold: f32,

    #[serde(default = "default_field_match_limit")]
    pub field_match_limit: usize,

    /// Number of most important nodes that learning paths connect.
    #[serde(default = "default_learning_path_top_n")]
    pub learning_path_top_n: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            index_path: default_index_path(),
            embedding_dimension: default_embedding_dimension(),
            cache_capacity: default_cache_capacity(),
            similarity_threshold: default_similarity_threshold(),
            relationship_threshold: default_relationship_threshold(),
            field_match_limit: default_field_match_limit(),
            learning_path_top_n: default_learning_path_top_n(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("~/.formscout/knowledge.db")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("~/.formscout/vector_index.json")
}

fn default_embedding_dimension() -> usize {
    128
}

fn default_cache_capacity() -> usize {
    256
}

fn default_similarity_threshold() -> f32 {
    0.1
}

fn default_relationship_threshold() -> f32 {
    0.6
}

fn default_field_match_limit() -> usize {
    20
}

fn default_learning_path_top_n() -> usize {
    10
}

/// Adaptive form filling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillConfig {
    /// Selector fallbacks tried per field before giving up.
    #[serde(default = "default_max_attempts_per_field")]
    pub max_attempts_per_field: u32,

    /// Base wait before interacting with a field.
    #[serde(default = "default_base_wait_ms")]
    pub base_wait_ms: u64,

    #[serde(default = "default_true")]
    pub submit: bool,

    /// Fixed RNG seed for reproducible answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Retries of a failed page load or reload before the fill is given up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_field: default_max_attempts_per_field(),
            base_wait_ms: default_base_wait_ms(),
            submit: true,
            seed: None,
            max_retries: default_max_retries(),
            backoff: BackoffConfig::default(),
        }
    }
}

fn default_max_attempts_per_field() -> u32 {
    3
}

fn default_base_wait_ms() -> u64 {
    150
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.browser.pool_size, 4);
        assert!(config.browser.headless);
        assert_eq!(config.browser.debug_port, 9222);
        assert!(!config.browser.user_agents.is_empty());
        assert_eq!(config.scheduler.concurrency, 4);
        assert_eq!(config.scheduler.batch_size, 8);
        assert_eq!(config.scheduler.max_retries, 2);
        assert_eq!(config.scheduler.strategy, "comprehensive");
        assert_eq!(config.scheduler.backoff.kind, BackoffKind::Linear);
        assert_eq!(config.knowledge.embedding_dimension, 128);
        assert!((config.knowledge.similarity_threshold - 0.1).abs() < f32::EPSILON);
        assert!((config.knowledge.relationship_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.knowledge.field_match_limit, 20);
        assert_eq!(config.fill.max_attempts_per_field, 3);
        assert!(config.fill.submit);
        assert!(config.fill.seed.is_none());
        assert_eq!(config.fill.max_retries, 2);
        assert_eq!(config.fill.backoff.base_delay_ms, 500);
    }

    #[test]
    fn test_backoff_kind_serde() {
        let json = serde_json::to_string(&BackoffKind::Exponential).unwrap();
        assert_eq!(json, "\"exponential\"");
        let kind: BackoffKind = serde_json::from_str("\"linear\"").unwrap();
        assert_eq!(kind, BackoffKind::Linear);
    }

    #[test]
    fn test_roundtrip_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.scheduler.timeout_per_site_ms, 45_000);
        assert_eq!(parsed.knowledge.cache_capacity, 256);
    }
}
