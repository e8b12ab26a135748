//! `crawl` subcommand.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use formscout_config::Config;
use formscout_protocols::AnalysisStrategy;
use formscout_scheduler::{RunSettings, SiteAnalysisScheduler, tune};

use crate::{open_pool, open_store};

/// Command-line overrides for the configured scheduler settings.
pub(crate) struct Overrides {
    pub strategy: Option<String>,
    pub concurrency: Option<usize>,
    pub batch_size: Option<usize>,
    pub adaptive: bool,
}

/// Parse a sites file: one URL per line, blank lines and `#` comments skipped.
pub(crate) fn parse_sites(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) async fn crawl(
    config: &Config,
    connect: Option<&str>,
    sites_file: &Path,
    overrides: Overrides,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let sites = parse_sites(&std::fs::read_to_string(sites_file)?);
    if sites.is_empty() {
        warn!("No sites in {}", sites_file.display());
    }

    let store = open_store(config).await?;
    let pool = open_pool(config, connect).await?;
    let scheduler = SiteAnalysisScheduler::new(pool.clone(), store.clone(), config.scheduler.clone());

    let mut settings = RunSettings::from_config(&config.scheduler)?;
    if let Some(strategy) = overrides.strategy {
        settings = settings.with_strategy(strategy.parse::<AnalysisStrategy>()?);
    }
    if overrides.adaptive || settings.adaptive {
        settings.adaptive = true;
        settings = tune(&store, settings).await?;
    }
    // Explicit flags win over tuned values.
    if let Some(concurrency) = overrides.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(batch_size) = overrides.batch_size {
        settings.batch_size = batch_size;
    }

    let result = scheduler.run_with(&sites, settings, cancel).await;
    pool.close().await;
    let report = result?;

    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    info!(
        "{} of {} sites analyzed in {} ms ({:.1}x speedup)",
        report.successful, report.total_sites, report.wall_clock_ms, report.metrics.speed_improvement
    );
    Ok(())
}
