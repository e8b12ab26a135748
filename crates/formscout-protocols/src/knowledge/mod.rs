//! Knowledge base data model.

mod graph;
mod kind;
mod payload;
mod record;

pub use graph::*;
pub use kind::KnowledgeKind;
pub use payload::*;
pub use record::{KnowledgeRecord, KnowledgeStats, Metadata};

#[cfg(test)]
#[path = "knowledge_tests.rs"]
mod tests;
