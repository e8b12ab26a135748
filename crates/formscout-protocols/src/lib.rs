//! # FormScout Protocols
//!
//! Shared definitions for the FormScout crawler and knowledge base.
//! Contains the data model, the error taxonomy and the browser-automation
//! traits - no storage or browser implementations.
//!
//! ## Core Types
//!
//! - [`KnowledgeRecord`] - A stored unit of learned information
//! - [`KnowledgePayload`] - Kind-specific typed content of a record
//! - [`KnowledgeRelationship`], [`KnowledgeCluster`], [`LearningPath`] - Graph artifacts
//! - [`PageStructure`] - Detected structure of a crawled page
//! - [`AnalysisResult`] - Per-site outcome of a crawl
//!
//! ## Core Traits
//!
//! - [`BrowserDriver`] - Launches isolated browser contexts
//! - [`BrowserContext`] - One isolated cookie/storage namespace
//! - [`BrowserPage`] - A page that can navigate and evaluate scripts

pub mod analysis;
pub mod browser;
pub mod error;
pub mod knowledge;
pub mod page;

pub use analysis::{AnalysisResult, AnalysisStrategy};
pub use browser::{ANALYZE_SCRIPT_TAG, BrowserContext, BrowserDriver, BrowserPage, ContextOptions};
pub use error::{
    BrowserError, ErrorCategory, FillError, KnowledgeError, SchedulerError, StorageError,
};
pub use knowledge::*;
pub use page::{FieldInfo, FormInfo, PageStructure, Platform, QuestionType};
