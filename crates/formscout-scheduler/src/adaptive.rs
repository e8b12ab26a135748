//! Run settings tuned from stored knowledge.

use serde_json::Value;
use tracing::info;

use formscout_knowledge::KnowledgeStore;
use formscout_protocols::{
    ErrorCategory, KnowledgeError, KnowledgeKind, KnowledgePayload, VelocityOptimizationPayload,
};

use crate::scheduler::RunSettings;

const TIMEOUT_GROWTH: f64 = 1.5;
const TIMEOUT_CAP: u64 = 3;
const NAVIGATION_SUCCESS_FLOOR: f32 = 0.5;

/// Adopt the concurrency and batch size of the fastest past run, and give
/// sites more time when navigation failures have mostly stayed unsolved.
///
/// The timeout grows by 1.5x per unsolved navigation failure pattern and
/// never past three times the value passed in.
pub async fn tune(store: &KnowledgeStore, mut settings: RunSettings) -> Result<RunSettings, KnowledgeError> {
    let best_run = store
        .list_by_kind(KnowledgeKind::VelocityOptimization)
        .await?
        .into_iter()
        .filter_map(|record| match record.payload {
            KnowledgePayload::VelocityOptimization(v) if v.site_url.is_empty() => record
                .metadata
                .get(VelocityOptimizationPayload::SPEED_IMPROVEMENT)
                .and_then(Value::as_f64)
                .map(|speed| (speed, v)),
            _ => None,
        })
        .filter(|(_, v)| v.concurrency > 0 && v.batch_size > 0)
        .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if let Some((speed, best)) = best_run {
        info!(
            "Adopting concurrency {} and batch size {} from a past run ({:.2}x speedup)",
            best.concurrency, best.batch_size, speed
        );
        settings.concurrency = best.concurrency as usize;
        settings.batch_size = best.batch_size as usize;
    }

    let navigation_rates: Vec<f32> = store
        .list_by_kind(KnowledgeKind::ErrorSolution)
        .await?
        .into_iter()
        .filter(|record| record.stats.usage_count > 0)
        .filter(|record| {
            matches!(
                &record.payload,
                KnowledgePayload::ErrorSolution(e) if e.error_category == ErrorCategory::Navigation.as_str()
            )
        })
        .map(|record| record.stats.success_rate)
        .collect();

    if !navigation_rates.is_empty() {
        let mean = navigation_rates.iter().sum::<f32>() / navigation_rates.len() as f32;
        if mean < NAVIGATION_SUCCESS_FLOOR {
            let unsolved = navigation_rates
                .iter()
                .filter(|rate| **rate < NAVIGATION_SUCCESS_FLOOR)
                .count()
                .max(1);
            let factor = TIMEOUT_GROWTH.powi(unsolved as i32).min(TIMEOUT_CAP as f64);
            let cap = settings.timeout_per_site_ms.saturating_mul(TIMEOUT_CAP);
            let grown = ((settings.timeout_per_site_ms as f64) * factor).round() as u64;
            info!(
                "Navigation failures resolved only {:.0}% of the time; timeout {}ms -> {}ms",
                mean * 100.0,
                settings.timeout_per_site_ms,
                grown.min(cap)
            );
            settings.timeout_per_site_ms = grown.min(cap);
        }
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formscout_config::{KnowledgeConfig, SchedulerConfig};
    use formscout_knowledge::UsageOutcome;
    use formscout_protocols::{ErrorSolutionPayload, KnowledgeRecord};

    fn settings() -> RunSettings {
        RunSettings::from_config(&SchedulerConfig {
            concurrency: 2,
            batch_size: 4,
            timeout_per_site_ms: 1000,
            adaptive: true,
            ..Default::default()
        })
        .unwrap()
    }

    fn run_record(concurrency: u32, batch_size: u32, speed: f32) -> KnowledgeRecord {
        KnowledgeRecord::new(KnowledgePayload::VelocityOptimization(VelocityOptimizationPayload {
            technique: "batched_parallel_crawl".to_string(),
            strategy: "quick".to_string(),
            concurrency,
            batch_size,
            ..Default::default()
        }))
        .with_metadata(VelocityOptimizationPayload::SPEED_IMPROVEMENT, speed.into())
    }

    async fn store() -> KnowledgeStore {
        KnowledgeStore::in_memory(KnowledgeConfig::default()).await.unwrap()
    }

    async fn navigation_solution(store: &KnowledgeStore, pattern: &str, successes: &[bool]) {
        let id = store
            .put(KnowledgeRecord::new(KnowledgePayload::ErrorSolution(ErrorSolutionPayload {
                error_category: "navigation".to_string(),
                error_message_pattern: pattern.to_string(),
                solution_strategy: "increase_timeout_and_retry".to_string(),
                ..Default::default()
            })))
            .await
            .unwrap();
        for success in successes {
            let outcome = if *success { UsageOutcome::success() } else { UsageOutcome::failure() };
            store
                .record_usage(&id, KnowledgeKind::ErrorSolution, outcome)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_store_changes_nothing() {
        let tuned = tune(&store().await, settings()).await.unwrap();
        assert_eq!(tuned.concurrency, 2);
        assert_eq!(tuned.batch_size, 4);
        assert_eq!(tuned.timeout_per_site_ms, 1000);
    }

    #[tokio::test]
    async fn test_adopts_fastest_run() {
        let store = store().await;
        store.put(run_record(3, 6, 1.8)).await.unwrap();
        store.put(run_record(6, 12, 4.2)).await.unwrap();
        store.put(run_record(8, 16, 2.5)).await.unwrap();

        let mut per_site = run_record(16, 32, 9.0);
        if let KnowledgePayload::VelocityOptimization(v) = &mut per_site.payload {
            v.site_url = "https://a.test".to_string();
        }
        store.put(per_site).await.unwrap();

        let tuned = tune(&store, settings()).await.unwrap();
        assert_eq!(tuned.concurrency, 6);
        assert_eq!(tuned.batch_size, 12);
    }

    #[tokio::test]
    async fn test_unsolved_navigation_failures_extend_timeout() {
        let store = store().await;
        navigation_solution(&store, "net::err_connection_refused", &[false, false, true]).await;

        let tuned = tune(&store, settings()).await.unwrap();
        assert_eq!(tuned.timeout_per_site_ms, 1500);

        navigation_solution(&store, "timeout: navigation to <url> timed out", &[false]).await;
        let tuned = tune(&store, settings()).await.unwrap();
        assert_eq!(tuned.timeout_per_site_ms, 2250);
    }

    #[tokio::test]
    async fn test_solved_navigation_failures_keep_timeout() {
        let store = store().await;
        navigation_solution(&store, "timeout: navigation to <url> timed out", &[true, true, false]).await;

        let tuned = tune(&store, settings()).await.unwrap();
        assert_eq!(tuned.timeout_per_site_ms, 1000);
    }

    #[tokio::test]
    async fn test_timeout_growth_is_capped() {
        let store = store().await;
        for pattern in ["a refused", "b reset", "c unreachable", "d timed out"] {
            navigation_solution(&store, pattern, &[false]).await;
        }

        let tuned = tune(&store, settings()).await.unwrap();
        assert_eq!(tuned.timeout_per_site_ms, 3000);
    }
}
