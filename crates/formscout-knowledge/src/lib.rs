//! # FormScout Knowledge
//!
//! The knowledge base behind the crawler: typed records in SQLite, a
//! parallel vector index for similarity search, and a relationship graph
//! used to recommend strategies for new sites.
//!
//! ## Example
//!
//! ```rust,ignore
//! use formscout_knowledge::{KnowledgeStore, KnowledgeGraph, field_pattern};
//!
//! let store = Arc::new(KnowledgeStore::open(config.knowledge.clone()).await?);
//! let id = store.put(record).await?;
//! let hits = store.find_by_field_match(&field_pattern([("platform_type", "typeform")]), None).await?;
//! KnowledgeGraph::new(store.clone()).rebuild().await?;
//! ```

mod cache;
pub mod graph;
mod recommend;
mod rows;
mod schema;
mod search;
mod store;

pub use cache::RecordCache;
pub use graph::{GraphNode, GraphSnapshot, KnowledgeGraph};
pub use recommend::{Recommendation, RecommendationContext, RecommendationSource};
pub use search::{FieldPattern, field_pattern};
pub use store::{KnowledgeStore, SimilarityMatch, StoreStats, UsageOutcome};
