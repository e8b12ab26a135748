//! Knowledge records produced by a run.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use formscout_knowledge::{KnowledgeStore, UsageOutcome};
use formscout_protocols::{
    AnalysisResult, AnalysisStrategy, ErrorCategory, ErrorSolutionPayload, FormStructurePayload,
    KnowledgeError, KnowledgeKind, KnowledgePayload, KnowledgeRecord, PageStructure, Platform,
    SitePatternPayload, VelocityOptimizationPayload,
};

use crate::platform::detect_platform;
use crate::report::PerformanceMetrics;
use crate::scheduler::RunSettings;

pub(crate) const SITE_TECHNIQUE: &str = "parallel_site_analysis";
pub(crate) const RUN_TECHNIQUE: &str = "batched_parallel_crawl";
pub(crate) const RETRY_SOLUTION: &str = "retry_with_backoff";

fn strategy_confidence(strategy: AnalysisStrategy) -> f32 {
    match strategy {
        AnalysisStrategy::Comprehensive => 0.8,
        AnalysisStrategy::FormFocused => 0.7,
        AnalysisStrategy::PatternDetection => 0.6,
        AnalysisStrategy::Quick => 0.5,
    }
}

/// Suggested fix once retries for a category are used up.
pub(crate) fn solution_for(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Navigation => "increase_timeout_and_retry",
        ErrorCategory::ElementInteraction => "fallback_selector",
        ErrorCategory::Context => "reload_and_retry",
        ErrorCategory::VisibilityFailure => "wait_for_visibility",
        _ => "skip_site",
    }
}

fn platform_label(platform: Platform) -> String {
    match platform {
        Platform::Unknown => String::new(),
        other => other.as_str().to_string(),
    }
}

/// Writes analysis outcomes into the knowledge store.
pub(crate) struct KnowledgeEmitter {
    store: Arc<KnowledgeStore>,
    url_re: Option<Regex>,
    number_re: Option<Regex>,
    emitted: BTreeMap<String, usize>,
}

impl KnowledgeEmitter {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self {
            store,
            url_re: Regex::new(r"[a-z][a-z0-9+.-]*://\S+").ok(),
            number_re: Regex::new(r"\d+").ok(),
            emitted: BTreeMap::new(),
        }
    }

    pub fn emitted(&self) -> &BTreeMap<String, usize> {
        &self.emitted
    }

    /// Strip URLs and numbers so the same failure on different sites maps
    /// onto one record.
    pub fn message_pattern(&self, message: &str) -> String {
        let mut pattern = message.to_ascii_lowercase();
        if let Some(re) = &self.url_re {
            pattern = re.replace_all(&pattern, "<url>").into_owned();
        }
        if let Some(re) = &self.number_re {
            pattern = re.replace_all(&pattern, "<n>").into_owned();
        }
        pattern.trim().to_string()
    }

    async fn put(&mut self, record: KnowledgeRecord) -> Result<String, KnowledgeError> {
        let kind = record.kind();
        let id = self.store.put(record).await?;
        *self.emitted.entry(kind.as_str().to_string()).or_insert(0) += 1;
        debug!("Emitted {} record {}", kind, id);
        Ok(id)
    }

    /// Site pattern, per-form structures and the per-site velocity record.
    /// A site that only succeeded after retries also reinforces the retry
    /// solution for the failure it recovered from.
    pub async fn site_success(
        &mut self,
        result: &AnalysisResult,
        page: &PageStructure,
        settings: &RunSettings,
        recovered_from: Option<&(ErrorCategory, String)>,
    ) -> Result<(), KnowledgeError> {
        let platform = platform_label(result.platform_guess);
        let confidence = strategy_confidence(settings.strategy);

        let pattern = SitePatternPayload {
            platform_type: platform.clone(),
            pattern_type: result.platform_guess.as_str().to_string(),
            site_url: result.site.clone(),
            pattern_data: result.patterns.join(";"),
            form_count: result.forms_found as u32,
            complexity_score: result.complexity_score,
        };
        self.put(
            KnowledgeRecord::new(KnowledgePayload::SitePattern(pattern))
                .with_confidence(confidence)
                .with_success_rate(1.0)
                .with_metadata("strategy", settings.strategy.as_str().into()),
        )
        .await?;

        for (index, form) in page.forms.iter().enumerate() {
            let structure = FormStructurePayload {
                platform_type: platform.clone(),
                site_url: result.site.clone(),
                form_selector: form
                    .selector
                    .clone()
                    .unwrap_or_else(|| format!("form:nth-of-type({})", index + 1)),
                field_count: form.fields.len() as u32,
                field_types: form.fields.iter().map(|f| f.effective_type()).collect(),
                question_types: form
                    .fields
                    .iter()
                    .map(|f| f.question_type().as_str().to_string())
                    .collect(),
                has_captcha: page.has_captcha,
                multi_step: page.multi_step,
            };
            self.put(
                KnowledgeRecord::new(KnowledgePayload::FormStructure(structure))
                    .with_confidence(confidence)
                    .with_success_rate(1.0),
            )
            .await?;
        }

        let velocity = VelocityOptimizationPayload {
            technique: SITE_TECHNIQUE.to_string(),
            platform_type: platform.clone(),
            strategy: settings.strategy.as_str().to_string(),
            site_url: result.site.clone(),
            concurrency: settings.concurrency as u32,
            batch_size: settings.batch_size as u32,
        };
        self.put(
            KnowledgeRecord::new(KnowledgePayload::VelocityOptimization(velocity))
                .with_confidence(confidence)
                .with_success_rate(1.0)
                .with_metadata(
                    VelocityOptimizationPayload::ANALYSIS_TIME_MS,
                    result.analysis_time_ms.into(),
                ),
        )
        .await?;

        if let Some((category, message)) = recovered_from {
            let solution = ErrorSolutionPayload {
                error_category: category.as_str().to_string(),
                error_message_pattern: self.message_pattern(message),
                solution_strategy: RETRY_SOLUTION.to_string(),
                platform_type: platform,
                input_type: None,
            };
            let id = self
                .put(KnowledgeRecord::new(KnowledgePayload::ErrorSolution(solution)).with_confidence(0.6))
                .await?;
            self.store
                .record_usage(
                    &id,
                    KnowledgeKind::ErrorSolution,
                    UsageOutcome::success()
                        .with_context(result.site.clone())
                        .with_metric("attempts", result.attempts),
                )
                .await?;
        }
        Ok(())
    }

    /// Failure knowledge for a site whose retries ran out.
    pub async fn site_failure(&mut self, result: &AnalysisResult) -> Result<(), KnowledgeError> {
        let category = result.error_category.unwrap_or(ErrorCategory::Other);
        if category == ErrorCategory::Cancelled {
            return Ok(());
        }
        let message = result.error.as_deref().unwrap_or("unknown error");
        let platform = detect_platform(&result.site, &PageStructure::default());

        let solution = ErrorSolutionPayload {
            error_category: category.as_str().to_string(),
            error_message_pattern: self.message_pattern(message),
            solution_strategy: solution_for(category).to_string(),
            platform_type: platform_label(platform),
            input_type: None,
        };
        let id = self
            .put(KnowledgeRecord::new(KnowledgePayload::ErrorSolution(solution)).with_confidence(0.4))
            .await?;
        self.store
            .record_usage(
                &id,
                KnowledgeKind::ErrorSolution,
                UsageOutcome::failure()
                    .with_context(result.site.clone())
                    .with_metric("attempts", result.attempts),
            )
            .await
    }

    /// Run-level velocity record carrying the measured speed improvement.
    pub async fn run_summary(
        &mut self,
        metrics: &PerformanceMetrics,
        settings: &RunSettings,
        sites: usize,
    ) -> Result<(), KnowledgeError> {
        if sites == 0 {
            return Ok(());
        }
        let velocity = VelocityOptimizationPayload {
            technique: RUN_TECHNIQUE.to_string(),
            platform_type: String::new(),
            strategy: settings.strategy.as_str().to_string(),
            site_url: String::new(),
            concurrency: settings.concurrency as u32,
            batch_size: settings.batch_size as u32,
        };
        self.put(
            KnowledgeRecord::new(KnowledgePayload::VelocityOptimization(velocity))
                .with_confidence(metrics.success_rate as f32)
                .with_success_rate(metrics.success_rate as f32)
                .with_metadata(
                    VelocityOptimizationPayload::ANALYSIS_TIME_MS,
                    (metrics.avg_site_time_ms.round() as u64).into(),
                )
                .with_metadata(
                    VelocityOptimizationPayload::SPEED_IMPROVEMENT,
                    metrics.speed_improvement.into(),
                )
                .with_metadata("sites", sites.into())
                .with_metadata("concurrency_achieved", metrics.concurrency_achieved.into()),
        )
        .await?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), KnowledgeError> {
        self.store.flush_index()
    }
}

#[cfg(test)]
#[path = "emit_tests.rs"]
mod tests;
