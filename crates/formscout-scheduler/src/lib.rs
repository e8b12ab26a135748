//! # FormScout Scheduler
//!
//! Runs page analysis over many sites with a bounded browser pool.
//!
//! Sites are split into batches that run one after another; analyses
//! inside a batch run in parallel, limited by both the configured
//! concurrency and the pool size. Failed analyses are retried with
//! backoff and end up as failure entries in the [`RunReport`], never as
//! errors from [`SiteAnalysisScheduler::run`].

mod adaptive;
mod emit;
mod platform;
mod report;
mod scheduler;
pub mod scripts;

pub use adaptive::tune;
pub use platform::{complexity_score, detect_platform, extract_patterns};
pub use report::{PerformanceMetrics, RunReport};
pub use scheduler::{RunSettings, SiteAnalysisScheduler};
