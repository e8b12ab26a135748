//! Browser automation protocol definitions.
//!
//! Any automation driver providing launch / new context / new page /
//! goto / evaluate / close semantics can back the crawler. Launching is
//! the driver's constructor; everything else goes through these traits.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrowserError;

/// Comment tag opening every page-analysis script. Drivers that simulate
/// pages use it to tell analysis from interaction scripts.
pub const ANALYZE_SCRIPT_TAG: &str = "/* formscout:analyze */";

/// Options for an isolated browser context.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// User agent fixed for the context's lifetime.
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Navigation timeout applied by pages of this context.
    pub navigation_timeout_ms: u64,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            viewport_width: 1280,
            viewport_height: 720,
            navigation_timeout_ms: 30_000,
        }
    }
}

/// A launched browser able to create isolated contexts.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Create a context with its own cookie/storage namespace.
    async fn new_context(&self, options: ContextOptions) -> Result<Arc<dyn BrowserContext>, BrowserError>;

    /// Shut the browser down.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// One isolated cookie/storage namespace.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    fn id(&self) -> &str;

    fn user_agent(&self) -> &str;

    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// A page inside a context.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the document to become interactive.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Evaluate a script and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}
