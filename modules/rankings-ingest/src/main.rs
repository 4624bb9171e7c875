use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rankings_common::{Config, JobsConfig, SourceId, Week};
use rankings_ingest::{BrowserlessFetcher, IngestPipeline, OpenAiInference, RankExtractor};
use rankings_store::PgRankStore;

#[derive(Parser)]
#[command(name = "ingest", about = "Scrape and extract this week's power rankings")]
struct Cli {
    /// Path to the jobs TOML file (overrides RANKINGS_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Week to record, overriding the config file
    #[arg(long)]
    week: Option<i32>,

    /// Only run the job for this source id
    #[arg(long)]
    source: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rankings=info".parse()?))
        .init();

    info!("Rankings ingest starting...");

    let cli = Cli::parse();
    let config = Config::ingest_from_env()?;
    config.log_redacted();

    let config_path = cli.config.unwrap_or_else(|| config.jobs_config_path.clone());
    let mut jobs = JobsConfig::load(&config_path)
        .with_context(|| format!("Loading jobs from {}", config_path.display()))?;
    if let Some(week) = cli.week {
        jobs.week = Week(week);
    }
    if let Some(source) = cli.source {
        jobs.jobs.retain(|j| j.source_id == SourceId(source));
        anyhow::ensure!(!jobs.jobs.is_empty(), "No job configured for source {source}");
    }

    let store = PgRankStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let fetcher = BrowserlessFetcher::new(
        &config.browserless_url,
        config.browserless_token.as_deref(),
        Duration::from_secs(jobs.fetch.timeout_secs),
    )?;
    let inference = OpenAiInference::new(
        &config.openai_api_key,
        &jobs.model,
        Duration::from_secs(jobs.fetch.inference_timeout_secs),
    );

    let pipeline = IngestPipeline::new(
        Arc::new(fetcher),
        RankExtractor::new(Box::new(inference)),
        Arc::new(store),
        jobs.fetch.max_chars,
    );

    let summary = pipeline.run_batch(&jobs).await;
    info!("{summary}");

    Ok(())
}
