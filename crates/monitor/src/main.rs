//! Fatigue Monitor - Main Entry Point

use anyhow::Context;
use monitor::{init_logging, run, MonitorConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::load().context("failed to load configuration")?;
    init_logging(&config.logging)?;

    info!("=== Fatigue Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Backend {} as {}",
        config.backend.base_url, config.session.username
    );

    run(config).await?;
    Ok(())
}
