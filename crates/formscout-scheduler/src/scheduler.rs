//! Batched, bounded-concurrency site analysis.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use formscout_browser::BrowserPool;
use formscout_config::{Backoff, SchedulerConfig};
use formscout_knowledge::KnowledgeStore;
use formscout_protocols::{
    AnalysisResult, AnalysisStrategy, BrowserError, BrowserPage, ErrorCategory, PageStructure,
    SchedulerError,
};

use crate::adaptive;
use crate::emit::KnowledgeEmitter;
use crate::platform::{complexity_score, detect_platform, extract_patterns};
use crate::report::{self, PerformanceMetrics, RunReport};
use crate::scripts::analysis_script;

const CANCELLED: &str = "cancelled";

/// Parameters of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSettings {
    pub strategy: AnalysisStrategy,
    pub concurrency: usize,
    pub batch_size: usize,
    pub timeout_per_site_ms: u64,
    pub max_retries: u32,
    #[serde(skip)]
    pub backoff: Backoff,
    pub adaptive: bool,
}

impl RunSettings {
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        let strategy = config
            .strategy
            .parse::<AnalysisStrategy>()
            .map_err(SchedulerError::InvalidConfig)?;
        let settings = Self {
            strategy,
            concurrency: config.concurrency,
            batch_size: config.batch_size,
            timeout_per_site_ms: config.timeout_per_site_ms,
            max_retries: config.max_retries,
            backoff: Backoff::from_config(&config.backoff),
            adaptive: config.adaptive,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_strategy(mut self, strategy: AnalysisStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.concurrency == 0 {
            return Err(SchedulerError::InvalidConfig("concurrency must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(SchedulerError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        if self.timeout_per_site_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "timeout_per_site_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Slots held by this run right now, and the most ever held at once.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// What one site produced.
struct SiteOutcome {
    index: usize,
    result: AnalysisResult,
    page: Option<PageStructure>,
    /// First failure of a site that succeeded on a later attempt.
    recovered_from: Option<(ErrorCategory, String)>,
}

struct SiteJob {
    index: usize,
    site: String,
    settings: RunSettings,
    pool: Arc<BrowserPool>,
    limiter: Arc<Semaphore>,
    in_flight: Arc<InFlight>,
    cancel: CancellationToken,
}

impl SiteJob {
    fn cancelled(&self, attempts: u32, started: Instant) -> SiteOutcome {
        SiteOutcome {
            index: self.index,
            result: AnalysisResult::failure(
                self.site.clone(),
                attempts,
                started.elapsed().as_millis() as u64,
                CANCELLED,
                ErrorCategory::Cancelled,
            ),
            page: None,
            recovered_from: None,
        }
    }

    async fn run(self) -> SiteOutcome {
        let queued = Instant::now();
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled(0, queued),
            permit = self.limiter.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return self.cancelled(0, queued),
            },
        };
        let started = Instant::now();

        let max_attempts = self.settings.max_retries.saturating_add(1);
        let mut attempts = 0;
        let mut first_failure: Option<(ErrorCategory, String)> = None;
        let mut last_error = None;

        while attempts < max_attempts {
            if attempts > 0 {
                let delay = self.settings.backoff.delay(attempts);
                debug!("Retrying {} in {:?}", self.site, delay);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return self.cancelled(attempts, started),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            attempts += 1;

            match self.attempt().await {
                Ok(page) => {
                    let platform = detect_platform(&self.site, &page);
                    let result = AnalysisResult {
                        site: self.site.clone(),
                        success: true,
                        analysis_time_ms: started.elapsed().as_millis() as u64,
                        platform_guess: platform,
                        complexity_score: complexity_score(&page),
                        patterns: extract_patterns(&page, platform),
                        forms_found: page.forms.len(),
                        attempts,
                        error: None,
                        error_category: None,
                    };
                    debug!(
                        "Analyzed {} as {} in {}ms ({} forms)",
                        self.site, platform, result.analysis_time_ms, result.forms_found
                    );
                    return SiteOutcome {
                        index: self.index,
                        result,
                        page: Some(page),
                        recovered_from: first_failure,
                    };
                }
                Err(BrowserError::Cancelled) => return self.cancelled(attempts, started),
                Err(e) => {
                    let retryable = e.is_retryable();
                    warn!(
                        "Attempt {}/{} for {} failed ({}): {}",
                        attempts,
                        max_attempts,
                        self.site,
                        e.category(),
                        e
                    );
                    if first_failure.is_none() {
                        first_failure = Some((e.category(), e.to_string()));
                    }
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let (message, category) = match last_error {
            Some(e) => (e.to_string(), e.category()),
            None => ("no attempts were made".to_string(), ErrorCategory::Other),
        };
        warn!("Giving up on {} after {} attempts: {}", self.site, attempts, message);
        SiteOutcome {
            index: self.index,
            result: AnalysisResult::failure(
                self.site.clone(),
                attempts,
                started.elapsed().as_millis() as u64,
                message,
                category,
            ),
            page: None,
            recovered_from: None,
        }
    }

    /// One navigation and evaluation on a freshly acquired slot. The slot
    /// goes back to the pool and the page is closed when this returns,
    /// whatever the outcome.
    async fn attempt(&self) -> Result<PageStructure, BrowserError> {
        let mut slot = self.pool.acquire(&self.cancel).await?;
        self.in_flight.enter();
        let outcome = match slot.new_page().await {
            Ok(page) => {
                let outcome = self.analyze(page.as_ref()).await;
                if let Err(e) = page.close().await {
                    debug!("Failed to close page for {}: {}", self.site, e);
                }
                outcome
            }
            Err(e) => Err(e),
        };

        if outcome.is_ok() {
            slot.record_analysis();
        }
        self.in_flight.exit();
        slot.release();
        outcome
    }

    /// Navigate and evaluate under the per-site timeout and the run's
    /// cancellation.
    async fn analyze(&self, page: &dyn BrowserPage) -> Result<PageStructure, BrowserError> {
        let timeout = Duration::from_millis(self.settings.timeout_per_site_ms);
        let script = analysis_script(self.settings.strategy);
        let work = async {
            page.goto(&self.site).await?;
            let value = page.evaluate(&script).await?;
            serde_json::from_value::<PageStructure>(value)
                .map_err(|e| BrowserError::Script(format!("unexpected analysis result: {}", e)))
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BrowserError::Cancelled),
            finished = tokio::time::timeout(timeout, work) => finished.unwrap_or_else(|_| {
                Err(BrowserError::Timeout(format!(
                    "analysis of {} exceeded {}ms",
                    self.site, self.settings.timeout_per_site_ms
                )))
            }),
        }
    }
}

/// Runs page analysis over lists of sites.
pub struct SiteAnalysisScheduler {
    pool: Arc<BrowserPool>,
    store: Arc<KnowledgeStore>,
    config: SchedulerConfig,
}

impl SiteAnalysisScheduler {
    pub fn new(pool: Arc<BrowserPool>, store: Arc<KnowledgeStore>, config: SchedulerConfig) -> Self {
        Self { pool, store, config }
    }

    pub fn pool(&self) -> &Arc<BrowserPool> {
        &self.pool
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Run with the configured settings, tuned from stored knowledge when
    /// `adaptive` is enabled.
    pub async fn run(
        &self,
        sites: &[String],
        cancel: &CancellationToken,
    ) -> Result<RunReport, SchedulerError> {
        let mut settings = RunSettings::from_config(&self.config)?;
        if settings.adaptive {
            settings = adaptive::tune(&self.store, settings).await?;
        }
        self.run_with(sites, settings, cancel).await
    }

    /// Analyze `sites` batch by batch.
    ///
    /// Per-site failures, including cancelled sites, are reported in the
    /// returned report. Only invalid settings and knowledge store failures
    /// abort the run.
    pub async fn run_with(
        &self,
        sites: &[String],
        settings: RunSettings,
        cancel: &CancellationToken,
    ) -> Result<RunReport, SchedulerError> {
        settings.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = Instant::now();
        let parallelism = settings.concurrency.min(self.pool.size());
        let batch_count = sites.len().div_ceil(settings.batch_size);
        let in_flight = Arc::new(InFlight::default());
        let mut emitter = KnowledgeEmitter::new(self.store.clone());
        let mut outcomes: Vec<(usize, AnalysisResult)> = Vec::with_capacity(sites.len());
        let mut cancelled = false;

        info!(
            "Run {}: {} sites in {} batches, strategy {}, parallelism {}",
            run_id,
            sites.len(),
            batch_count,
            settings.strategy,
            parallelism
        );

        for (batch_index, batch) in sites.chunks(settings.batch_size).enumerate() {
            let offset = batch_index * settings.batch_size;

            if cancel.is_cancelled() {
                cancelled = true;
                for (i, site) in batch.iter().enumerate() {
                    outcomes.push((
                        offset + i,
                        AnalysisResult::failure(site.clone(), 0, 0, CANCELLED, ErrorCategory::Cancelled),
                    ));
                }
                continue;
            }

            info!("Starting batch {}/{} ({} sites)", batch_index + 1, batch_count, batch.len());
            let limiter = Arc::new(Semaphore::new(parallelism));
            let mut tasks = JoinSet::new();
            let mut pending = HashMap::new();

            for (i, site) in batch.iter().enumerate() {
                let job = SiteJob {
                    index: offset + i,
                    site: site.clone(),
                    settings: settings.clone(),
                    pool: self.pool.clone(),
                    limiter: limiter.clone(),
                    in_flight: in_flight.clone(),
                    cancel: cancel.clone(),
                };
                let handle = tasks.spawn(job.run());
                pending.insert(handle.id(), (offset + i, site.clone()));
            }

            let mut succeeded = 0;
            while let Some(joined) = tasks.join_next_with_id().await {
                let outcome = match joined {
                    Ok((id, outcome)) => {
                        pending.remove(&id);
                        outcome
                    }
                    Err(e) => {
                        let (index, site) = pending.remove(&e.id()).unwrap_or_default();
                        error!("Analysis task for {} failed: {}", site, e);
                        SiteOutcome {
                            index,
                            result: AnalysisResult::failure(
                                site,
                                1,
                                0,
                                format!("analysis task failed: {}", e),
                                ErrorCategory::Other,
                            ),
                            page: None,
                            recovered_from: None,
                        }
                    }
                };

                match (outcome.result.success, &outcome.page) {
                    (true, Some(page)) => {
                        succeeded += 1;
                        emitter
                            .site_success(&outcome.result, page, &settings, outcome.recovered_from.as_ref())
                            .await?;
                    }
                    _ if outcome.result.error_category == Some(ErrorCategory::Cancelled) => {
                        cancelled = true;
                    }
                    _ => emitter.site_failure(&outcome.result).await?,
                }
                outcomes.push((outcome.index, outcome.result));
            }

            emitter.flush()?;
            info!(
                "Finished batch {}/{}: {}/{} succeeded",
                batch_index + 1,
                batch_count,
                succeeded,
                batch.len()
            );
        }

        outcomes.sort_by_key(|(index, _)| *index);
        let results: Vec<AnalysisResult> = outcomes.into_iter().map(|(_, r)| r).collect();
        let wall_clock_ms = clock.elapsed().as_millis() as u64;
        let metrics = PerformanceMetrics::compute(&results, wall_clock_ms, in_flight.peak(), batch_count);

        if !cancelled {
            emitter.run_summary(&metrics, &settings, results.len()).await?;
            emitter.flush()?;
        }

        let successful = results.iter().filter(|r| r.success).count();
        info!(
            "Run {} finished: {}/{} succeeded in {}ms ({:.2}x speedup)",
            run_id,
            successful,
            results.len(),
            wall_clock_ms,
            metrics.speed_improvement
        );

        Ok(RunReport {
            run_id,
            strategy: settings.strategy,
            total_sites: results.len(),
            successful,
            failed: results.len() - successful,
            cancelled,
            started_at,
            finished_at: Utc::now(),
            wall_clock_ms,
            platform_distribution: report::platform_distribution(&results),
            recommendations: report::recommendations(&results, &metrics, &settings),
            knowledge_emitted: emitter.emitted().clone(),
            metrics,
            settings,
            results,
        })
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
