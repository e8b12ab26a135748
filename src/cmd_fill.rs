//! `fill` subcommand.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use formscout_browser::BrowserPool;
use formscout_config::{Config, FillConfig};
use formscout_fill::{AdaptiveFillStrategy, FillOutcome, FillPlan};
use formscout_protocols::{AnalysisStrategy, BrowserError, PageStructure};
use formscout_scheduler::{detect_platform, scripts::analysis_script};

use crate::{open_pool, open_store};

/// Load `url` in a pool slot and read its structure.
async fn analyze(
    pool: &BrowserPool,
    url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<PageStructure, BrowserError> {
    let slot = pool.acquire(cancel).await?;
    let page = slot.new_page().await?;
    let analysis = async {
        page.goto(url).await?;
        let value = page.evaluate(&analysis_script(AnalysisStrategy::FormFocused)).await?;
        serde_json::from_value::<PageStructure>(value).map_err(|e| BrowserError::Script(e.to_string()))
    };
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BrowserError::Cancelled),
        r = tokio::time::timeout(timeout, analysis) => {
            r.unwrap_or_else(|_| Err(BrowserError::Timeout(format!("analysis of {} timed out", url))))
        }
    };
    let _ = page.close().await;
    let mut structure = result?;
    if structure.url.is_empty() {
        structure.url = url.to_string();
    }
    Ok(structure)
}

fn print_plan(plan: &FillPlan) {
    println!("Plan for {} ({})", plan.url, plan.platform);
    for step in &plan.steps {
        let families: Vec<&str> = step.selectors.iter().map(|c| c.family.as_str()).collect();
        println!(
            "  {:<40} {:<10} {:<16} {:<10} [{}] waits {:?}",
            step.question,
            step.input_type,
            step.question_type.as_str(),
            step.intent.as_str(),
            families.join(", "),
            step.waits_ms
        );
    }
    match &plan.submit_selector {
        Some(selector) => println!("  submit via {}", selector),
        None => println!("  no submission"),
    }
    for insight in &plan.insights {
        println!("  insight: {}", insight);
    }
}

async fn plan_and_run(
    pool: &BrowserPool,
    strategy: &AdaptiveFillStrategy,
    url: &str,
    timeout: Duration,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<Option<FillOutcome>, Box<dyn std::error::Error>> {
    let structure = analyze(pool, url, timeout, cancel).await?;
    let platform = detect_platform(url, &structure);
    info!("{} looks like {} with {} forms", url, platform, structure.forms.len());

    let plan = strategy.decide_plan(&structure, platform).await?;
    print_plan(&plan);
    if dry_run {
        return Ok(None);
    }

    let slot = pool.acquire(cancel).await?;
    let outcome = strategy.execute(&plan, &slot, cancel).await?;
    Ok(Some(outcome))
}

pub(crate) async fn fill(
    config: &Config,
    connect: Option<&str>,
    url: &str,
    dry_run: bool,
    no_submit: bool,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    let pool = open_pool(config, connect).await?;

    let fill_config = FillConfig {
        submit: config.fill.submit && !no_submit,
        ..config.fill.clone()
    };
    let strategy = AdaptiveFillStrategy::new(Arc::clone(&store), fill_config);
    let timeout = Duration::from_millis(config.scheduler.timeout_per_site_ms);

    let result = plan_and_run(&pool, &strategy, url, timeout, dry_run, cancel).await;
    pool.close().await;

    if let Some(outcome) = result? {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(())
}
