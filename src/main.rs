//! FormScout - form and survey crawler with a learning knowledge base
//!
//! Main entry point for the FormScout CLI.

mod cli;
mod cmd_crawl;
mod cmd_fill;
mod cmd_knowledge;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use formscout_browser::{BrowserPool, CdpDriver};
use formscout_config::{Config, ConfigLoader};
use formscout_knowledge::KnowledgeStore;
use formscout_protocols::BrowserDriver;

use crate::cli::{Cli, Commands};

/// Get the .formscout directory path.
fn formscout_dir() -> PathBuf {
    ConfigLoader::data_dir()
}

/// Initialize tracing with console and file output.
///
/// Logs go to `~/.formscout/logs/` with daily rotation, 30 files kept.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = formscout_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("formscout")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The worker flushes until the guard is dropped.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Open the knowledge store named by the configuration.
pub(crate) async fn open_store(config: &Config) -> Result<Arc<KnowledgeStore>, Box<dyn std::error::Error>> {
    let store = KnowledgeStore::open(config.knowledge.clone()).await?;
    info!("Knowledge store at {}", config.knowledge.database_path.display());
    Ok(Arc::new(store))
}

/// Launch (or connect to) Chrome and build the context pool.
pub(crate) async fn open_pool(
    config: &Config,
    connect: Option<&str>,
) -> Result<Arc<BrowserPool>, Box<dyn std::error::Error>> {
    let driver = match connect {
        Some(endpoint) => CdpDriver::connect(endpoint).await?,
        None => CdpDriver::launch(&config.browser).await?,
    };
    let driver: Arc<dyn BrowserDriver> = Arc::new(driver);
    Ok(Arc::new(BrowserPool::new(driver, &config.browser).await?))
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight work");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match cli.command {
        Commands::Crawl {
            sites,
            strategy,
            concurrency,
            batch_size,
            adaptive,
            output,
        } => {
            let overrides = cmd_crawl::Overrides {
                strategy,
                concurrency,
                batch_size,
                adaptive,
            };
            cmd_crawl::crawl(&config, cli.connect.as_deref(), &sites, overrides, output.as_deref(), &cancel)
                .await
        }
        Commands::Graph { threshold } => cmd_knowledge::graph(&config, threshold).await,
        Commands::Recommend {
            query,
            platform,
            kind,
            limit,
        } => cmd_knowledge::recommend(&config, &query, platform, kind.as_deref(), limit).await,
        Commands::Similar { query, kind, limit } => {
            cmd_knowledge::similar(&config, &query, kind.as_deref(), limit).await
        }
        Commands::Match { patterns, kind } => {
            cmd_knowledge::field_match(&config, &patterns, kind.as_deref()).await
        }
        Commands::Fill {
            url,
            dry_run,
            no_submit,
        } => cmd_fill::fill(&config, cli.connect.as_deref(), &url, dry_run, no_submit, &cancel).await,
        Commands::Stats { format } => cmd_knowledge::stats(&config, &format).await,
    }
}
