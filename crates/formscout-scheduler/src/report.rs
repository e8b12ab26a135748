//! Run report and performance metrics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use formscout_protocols::{AnalysisResult, AnalysisStrategy, Platform};

use crate::scheduler::RunSettings;

/// Aggregate timing and throughput of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceMetrics {
    pub success_rate: f64,
    pub avg_site_time_ms: f64,
    pub total_site_time_ms: u64,
    /// Summed per-site time over wall-clock time. Above 1.0 means the
    /// parallelism paid off.
    pub speed_improvement: f64,
    /// Highest number of browser slots held at the same time.
    pub concurrency_achieved: usize,
    pub batches: usize,
    /// Attempts beyond the first, over all sites.
    pub retries: u32,
}

impl PerformanceMetrics {
    pub fn compute(
        results: &[AnalysisResult],
        wall_clock_ms: u64,
        concurrency_achieved: usize,
        batches: usize,
    ) -> Self {
        if results.is_empty() {
            return Self {
                batches,
                concurrency_achieved,
                ..Default::default()
            };
        }

        let total = results.len() as f64;
        let successes = results.iter().filter(|r| r.success).count() as f64;
        let total_site_time_ms: u64 = results.iter().map(|r| r.analysis_time_ms).sum();
        let avg_site_time_ms = total_site_time_ms as f64 / total;
        let speed_improvement = if wall_clock_ms == 0 {
            0.0
        } else {
            avg_site_time_ms * total / wall_clock_ms as f64
        };

        Self {
            success_rate: successes / total,
            avg_site_time_ms,
            total_site_time_ms,
            speed_improvement,
            concurrency_achieved,
            batches,
            retries: results.iter().map(|r| r.attempts.saturating_sub(1)).sum(),
        }
    }
}

/// Summary of a scheduler run, serialized as the crawl report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub strategy: AnalysisStrategy,
    pub total_sites: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub wall_clock_ms: u64,
    pub settings: RunSettings,
    pub metrics: PerformanceMetrics,
    pub platform_distribution: BTreeMap<Platform, usize>,
    /// Record ids emitted during the run, by kind.
    pub knowledge_emitted: BTreeMap<String, usize>,
    pub recommendations: Vec<String>,
    pub results: Vec<AnalysisResult>,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

pub(crate) fn platform_distribution(results: &[AnalysisResult]) -> BTreeMap<Platform, usize> {
    let mut distribution = BTreeMap::new();
    for result in results.iter().filter(|r| r.success) {
        *distribution.entry(result.platform_guess).or_insert(0) += 1;
    }
    distribution
}

/// Operator-facing suggestions derived from the run's own numbers.
pub(crate) fn recommendations(
    results: &[AnalysisResult],
    metrics: &PerformanceMetrics,
    settings: &RunSettings,
) -> Vec<String> {
    let mut out = Vec::new();
    if results.is_empty() {
        return out;
    }

    let timeouts = results
        .iter()
        .filter(|r| {
            r.error
                .as_deref()
                .is_some_and(|e| e.to_ascii_lowercase().contains("timeout") || e.contains("timed out"))
        })
        .count();
    if timeouts * 5 > results.len() {
        out.push(format!(
            "{} of {} sites timed out; consider raising timeout_per_site_ms above {}",
            timeouts,
            results.len(),
            settings.timeout_per_site_ms
        ));
    }
    if metrics.success_rate < 0.5 {
        out.push(format!(
            "success rate {:.0}% is low; try the quick strategy or more retries",
            metrics.success_rate * 100.0
        ));
    }
    if metrics.concurrency_achieved < settings.concurrency && results.len() > settings.concurrency {
        out.push(format!(
            "only {} of {} requested analyses ran in parallel; the browser pool is the bottleneck",
            metrics.concurrency_achieved, settings.concurrency
        ));
    }
    if metrics.speed_improvement > 0.0 && metrics.speed_improvement < 1.2 && settings.concurrency > 1 {
        out.push(format!(
            "parallel speedup was only {:.2}x; batches may be too small",
            metrics.speed_improvement
        ));
    }
    out
}
