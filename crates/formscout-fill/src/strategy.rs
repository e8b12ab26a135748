//! Knowledge-driven fill planning and execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use formscout_browser::SlotGuard;
use formscout_config::{Backoff, FillConfig};
use formscout_knowledge::{KnowledgeStore, RecommendationContext, UsageOutcome, field_pattern};
use formscout_protocols::{
    AutomationRulePayload, BrowserError, BrowserPage, ErrorCategory, ErrorSolutionPayload,
    FillError, FormInfo, KnowledgeKind, KnowledgePayload, KnowledgeRecord, PageStructure, Platform,
};

use crate::intent::Intent;
use crate::plan::{FieldOutcome, FillOutcome, FillPlan, FillStep};
use crate::response::ResponseGenerator;
use crate::script::{fill_script, parse_result, submit_script};
use crate::selectors::{SelectorFamily, candidates, rank_families, wait_schedule};

pub(crate) const SELECTOR_RULE: &str = "selector_preference";
const FILL_TRIGGER: &str = "field_fill";
const VISIBILITY_SOLUTION: &str = "wait_for_visibility";
const RETRY_SOLUTION: &str = "retry_with_backoff";
const RECOMMENDATION_LIMIT: usize = 5;

/// What happened on the page while a plan ran.
#[derive(Default)]
struct PageRun {
    fields: Vec<FieldOutcome>,
    submitted: bool,
    navigation_attempts: u32,
    /// Category of the last failed page load.
    failed_category: Option<ErrorCategory>,
    /// Failure that stopped the run.
    error: Option<BrowserError>,
}

/// Decides fill plans from stored knowledge and feeds outcomes back.
pub struct AdaptiveFillStrategy {
    store: Arc<KnowledgeStore>,
    config: FillConfig,
    responses: Mutex<ResponseGenerator>,
}

impl AdaptiveFillStrategy {
    pub fn new(store: Arc<KnowledgeStore>, config: FillConfig) -> Self {
        let responses = Mutex::new(ResponseGenerator::new(config.seed));
        Self {
            store,
            config,
            responses,
        }
    }

    /// Success rate of each selector family on `platform`, from
    /// `selector_preference` rules that have been used at least once.
    async fn learned_families(
        &self,
        platform: Platform,
    ) -> Result<HashMap<SelectorFamily, f32>, FillError> {
        let rules = self
            .store
            .find_by_field_match(
                &field_pattern([("rule_name", SELECTOR_RULE), ("platform_type", platform.as_str())]),
                Some(KnowledgeKind::AutomationRule),
            )
            .await?;

        let mut learned = HashMap::new();
        for rule in rules {
            let KnowledgePayload::AutomationRule(payload) = &rule.payload else {
                continue;
            };
            if rule.stats.usage_count == 0 || payload.platform_type != platform.as_str() {
                continue;
            }
            if let Ok(family) = payload.action.parse::<SelectorFamily>() {
                learned.insert(family, rule.stats.success_rate);
            }
        }
        Ok(learned)
    }

    /// Visibility failures per input type that no wait has resolved yet.
    async fn unresolved_visibility_failures(&self) -> Result<HashMap<String, u64>, FillError> {
        let solutions = self
            .store
            .find_by_field_match(
                &field_pattern([("error_category", ErrorCategory::VisibilityFailure.as_str())]),
                Some(KnowledgeKind::ErrorSolution),
            )
            .await?;

        let mut failures = HashMap::new();
        for solution in solutions {
            let KnowledgePayload::ErrorSolution(payload) = &solution.payload else {
                continue;
            };
            let Some(input_type) = &payload.input_type else {
                continue;
            };
            let unresolved =
                (solution.stats.usage_count as f32 * (1.0 - solution.stats.success_rate)).round() as u64;
            *failures.entry(input_type.clone()).or_insert(0) += unresolved;
        }
        Ok(failures)
    }

    /// Form with the most fields; ties go to the first one.
    fn primary_form(page: &PageStructure) -> Option<&FormInfo> {
        page.forms
            .iter()
            .filter(|f| !f.fields.is_empty())
            .fold(None, |best: Option<&FormInfo>, form| match best {
                Some(b) if b.fields.len() >= form.fields.len() => Some(b),
                _ => Some(form),
            })
    }

    /// Build a plan for the page's primary form.
    ///
    /// Fails with [`FillError::EmptyPlan`] when no form has fields.
    pub async fn decide_plan(
        &self,
        page: &PageStructure,
        platform: Platform,
    ) -> Result<FillPlan, FillError> {
        let form = Self::primary_form(page).ok_or(FillError::EmptyPlan)?;

        let learned = self.learned_families(platform).await?;
        let order = rank_families(&learned);
        let visibility = self.unresolved_visibility_failures().await?;
        let attempts = self.config.max_attempts_per_field.max(1);

        let mut insights = Vec::new();
        if !learned.is_empty() {
            insights.push(format!(
                "selector order {} from {} learned rules",
                order.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(">"),
                learned.len()
            ));
        }

        let question_types: Vec<&str> = form
            .fields
            .iter()
            .map(|f| f.question_type().as_str())
            .collect();
        let context = RecommendationContext::new(
            format!(
                "{} form fill {} fields complexity {} {}",
                platform,
                form.fields.len(),
                if page.multi_step || page.has_captcha { "high" } else { "low" },
                question_types.join(" ")
            ),
            RECOMMENDATION_LIMIT,
        )
        .with_platform(platform.as_str());
        for recommendation in self.store.recommend(&context).await? {
            insights.push(format!(
                "{} ({}, {:.2}): {}",
                recommendation.record.resolved_id(),
                recommendation.record.kind(),
                recommendation.confidence,
                recommendation.reason
            ));
        }

        let mut steps = Vec::with_capacity(form.fields.len());
        {
            let mut responses = self.responses.lock();
            for field in &form.fields {
                let selectors = candidates(field, &order, attempts as usize);
                if selectors.is_empty() {
                    debug!("Skipping field without a usable selector: {:?}", field.question_text());
                    continue;
                }
                let input_type = field.effective_type();
                let failures = visibility.get(&input_type).copied().unwrap_or(0);
                let waits_ms = wait_schedule(self.config.base_wait_ms, failures, selectors.len() as u32);
                let question = field.question_text();
                let intent = Intent::classify(&question);
                let question_type = field.question_type();
                let value = responses.respond(field, intent, question_type);

                steps.push(FillStep {
                    question,
                    input_type,
                    intent,
                    question_type,
                    required: field.required,
                    selectors,
                    waits_ms,
                    value,
                });
            }
        }
        if steps.is_empty() {
            return Err(FillError::EmptyPlan);
        }

        let submit_selector = if self.config.submit {
            form.submit_selector.clone().or_else(|| form.selector.clone())
        } else {
            None
        };

        debug!("Planned {} steps for {} ({})", steps.len(), page.url, platform);
        Ok(FillPlan {
            url: page.url.clone(),
            platform,
            form_selector: form.selector.clone(),
            steps,
            submit_selector,
            insights,
        })
    }

    async fn wait(&self, ms: u64, cancel: &CancellationToken) -> Result<(), FillError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FillError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
        }
    }

    /// Load `url`, retrying retryable failures with backoff.
    ///
    /// Returns `false` once retries run out or the failure is not
    /// retryable; the failure is left in `run.error`.
    async fn navigate(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        run: &mut PageRun,
        cancel: &CancellationToken,
    ) -> Result<bool, FillError> {
        let backoff = Backoff::from_config(&self.config.backoff);
        let mut retries = 0;
        loop {
            run.navigation_attempts += 1;
            let loaded = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FillError::Cancelled),
                loaded = page.goto(url) => loaded,
            };
            let e = match loaded {
                Ok(()) => {
                    run.error = None;
                    return Ok(true);
                }
                Err(BrowserError::Cancelled) => return Err(FillError::Cancelled),
                Err(e) => e,
            };
            run.failed_category = Some(e.category());
            if !e.is_retryable() || retries >= self.config.max_retries {
                warn!("Giving up on loading {} after {} attempts: {}", url, retries + 1, e);
                run.error = Some(e);
                return Ok(false);
            }
            retries += 1;
            let delay = backoff.delay(retries);
            warn!(
                "Loading {} failed, retry {}/{} in {:?}: {}",
                url, retries, self.config.max_retries, delay, e
            );
            self.wait(delay.as_millis() as u64, cancel).await?;
        }
    }

    async fn run_step(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        step: &FillStep,
        run: &mut PageRun,
        cancel: &CancellationToken,
    ) -> Result<FieldOutcome, FillError> {
        let mut outcome = FieldOutcome {
            question: step.question.clone(),
            input_type: step.input_type.clone(),
            filled: false,
            family: None,
            failed_families: Vec::new(),
            visibility_failures: 0,
            error: None,
        };
        let mut reloaded = false;
        let mut i = 0;

        while let (Some(candidate), Some(wait_ms)) = (step.selectors.get(i), step.waits_ms.get(i)) {
            self.wait(*wait_ms, cancel).await?;

            let result = match page.evaluate(&fill_script(candidate, &step.value)).await {
                Ok(value) => parse_result(&value),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    outcome.filled = true;
                    outcome.family = Some(candidate.family);
                    outcome.error = None;
                    return Ok(outcome);
                }
                // One reload per field, then the same selector again.
                Err(BrowserError::Context(message)) if !reloaded => {
                    warn!("Page context lost while filling {:?}, reloading: {}", step.question, message);
                    reloaded = true;
                    if !self.navigate(page, url, run, cancel).await? {
                        outcome.error = run.error.as_ref().map(ToString::to_string);
                        return Ok(outcome);
                    }
                    continue;
                }
                Err(e) if e.is_retryable() => {
                    if matches!(e, BrowserError::NotVisible(_)) {
                        outcome.visibility_failures += 1;
                    }
                    debug!("{} selector failed for {:?}: {}", candidate.family, step.question, e);
                    outcome.failed_families.push(candidate.family);
                    outcome.error = Some(e.to_string());
                }
                Err(BrowserError::Cancelled) => return Err(FillError::Cancelled),
                Err(e) => {
                    warn!("Filling {:?} failed: {}", step.question, e);
                    outcome.error = Some(e.to_string());
                    run.error = Some(e);
                    return Ok(outcome);
                }
            }
            i += 1;
        }
        Ok(outcome)
    }

    /// Run `plan` in a new page of `slot`, then record the outcome.
    ///
    /// Browser failures end up in an unsuccessful [`FillOutcome`]; only
    /// cancellation, store errors and a slot that cannot open a page are
    /// returned as errors.
    pub async fn execute(
        &self,
        plan: &FillPlan,
        slot: &SlotGuard<'_>,
        cancel: &CancellationToken,
    ) -> Result<FillOutcome, FillError> {
        let started = Instant::now();
        let page = slot.new_page().await?;

        let result = self.execute_on(plan, page.as_ref(), cancel).await;
        if let Err(e) = page.close().await {
            debug!("Failed to close fill page: {}", e);
        }
        let run = result?;

        let all_required = required_filled(&run.fields, &plan.steps);
        let any_filled = run.fields.iter().any(|f| f.filled);
        let submission_ok = plan.submit_selector.is_none() || run.submitted;

        let outcome = FillOutcome {
            url: plan.url.clone(),
            platform: plan.platform,
            success: run.error.is_none() && all_required && any_filled && submission_ok,
            fields: run.fields,
            submitted: run.submitted,
            elapsed_ms: started.elapsed().as_millis() as u64,
            navigation_attempts: run.navigation_attempts,
            error_category: run.error.as_ref().map(BrowserError::category).or(run.failed_category),
            error: run.error.as_ref().map(ToString::to_string),
        };
        info!(
            "Filled {}/{} fields on {} (submitted: {}, success: {})",
            outcome.filled_count(),
            plan.steps.len(),
            plan.url,
            outcome.submitted,
            outcome.success
        );

        self.record_outcome(&outcome).await?;
        Ok(outcome)
    }

    async fn execute_on(
        &self,
        plan: &FillPlan,
        page: &dyn BrowserPage,
        cancel: &CancellationToken,
    ) -> Result<PageRun, FillError> {
        let mut run = PageRun::default();
        if !self.navigate(page, &plan.url, &mut run, cancel).await? {
            return Ok(run);
        }

        for step in &plan.steps {
            let field = self.run_step(page, &plan.url, step, &mut run, cancel).await?;
            run.fields.push(field);
            if run.error.is_some() {
                return Ok(run);
            }
        }

        if plan.submit_selector.is_some() && required_filled(&run.fields, &plan.steps) {
            let script = submit_script(plan.submit_selector.as_deref(), plan.form_selector.as_deref());
            match page.evaluate(&script).await.and_then(|value| parse_result(&value)) {
                Ok(()) => run.submitted = true,
                Err(e) => warn!("Submitting {} failed: {}", plan.url, e),
            }
        }
        Ok(run)
    }

    /// Write selector, visibility and page-load knowledge for a finished
    /// fill.
    ///
    /// The family that filled a field gains a success, every family tried
    /// before it a failure. Fields that hit visibility failures reinforce
    /// the wait solution for their input type, as a success when the field
    /// was eventually filled. A failed page load reinforces the retry
    /// solution for its category, as a success when a retry got through.
    pub async fn record_outcome(&self, outcome: &FillOutcome) -> Result<(), FillError> {
        let platform = outcome.platform.as_str();

        if let Some(category) = outcome.error_category {
            let solution = ErrorSolutionPayload {
                error_category: category.as_str().to_string(),
                error_message_pattern: format!("{} failure on form page", category),
                solution_strategy: RETRY_SOLUTION.to_string(),
                platform_type: platform.to_string(),
                input_type: None,
            };
            let id = self
                .store
                .put(KnowledgeRecord::new(KnowledgePayload::ErrorSolution(solution)).with_confidence(0.5))
                .await?;
            let usage = if outcome.error.is_none() { UsageOutcome::success() } else { UsageOutcome::failure() };
            self.store
                .record_usage(
                    &id,
                    KnowledgeKind::ErrorSolution,
                    usage
                        .with_context(outcome.url.clone())
                        .with_metric("navigation_attempts", outcome.navigation_attempts),
                )
                .await?;
        }

        for field in &outcome.fields {
            let tried = field
                .failed_families
                .iter()
                .map(|f| (*f, false))
                .chain(field.family.map(|f| (f, true)));
            for (family, success) in tried {
                let rule = AutomationRulePayload {
                    rule_name: SELECTOR_RULE.to_string(),
                    trigger_condition: FILL_TRIGGER.to_string(),
                    action: family.as_str().to_string(),
                    platform_type: platform.to_string(),
                };
                let id = self
                    .store
                    .put(KnowledgeRecord::new(KnowledgePayload::AutomationRule(rule)).with_confidence(0.5))
                    .await?;
                let usage = if success { UsageOutcome::success() } else { UsageOutcome::failure() };
                self.store
                    .record_usage(
                        &id,
                        KnowledgeKind::AutomationRule,
                        usage
                            .with_context(outcome.url.clone())
                            .with_metric("input_type", field.input_type.clone()),
                    )
                    .await?;
            }

            if field.visibility_failures > 0 {
                let solution = ErrorSolutionPayload {
                    error_category: ErrorCategory::VisibilityFailure.as_str().to_string(),
                    error_message_pattern: format!("{} field not visible", field.input_type),
                    solution_strategy: VISIBILITY_SOLUTION.to_string(),
                    platform_type: platform.to_string(),
                    input_type: Some(field.input_type.clone()),
                };
                let id = self
                    .store
                    .put(KnowledgeRecord::new(KnowledgePayload::ErrorSolution(solution)).with_confidence(0.5))
                    .await?;
                let usage = if field.filled { UsageOutcome::success() } else { UsageOutcome::failure() };
                self.store
                    .record_usage(
                        &id,
                        KnowledgeKind::ErrorSolution,
                        usage
                            .with_context(outcome.url.clone())
                            .with_metric("visibility_failures", field.visibility_failures),
                    )
                    .await?;
            }
        }

        self.store.flush_index()?;
        Ok(())
    }
}

/// Every required step has a filled field; steps never reached count as
/// unfilled.
fn required_filled(fields: &[FieldOutcome], steps: &[FillStep]) -> bool {
    steps
        .iter()
        .enumerate()
        .all(|(i, step)| !step.required || fields.get(i).is_some_and(|f| f.filled))
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
