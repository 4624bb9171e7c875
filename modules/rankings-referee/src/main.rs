use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rankings_common::Config;
use rankings_referee::Referee;
use rankings_store::PgRankStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rankings=info".parse()?))
        .init();

    info!("Rankings referee starting...");

    let config = Config::referee_from_env()?;
    config.log_redacted();

    let store = PgRankStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let referee = Referee::new(Arc::new(store));
    let report = referee.sweep().await?;

    info!("Referee complete. {report}");
    Ok(())
}
