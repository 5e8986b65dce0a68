//! `snaptag-sync`: refresh the local object cache from the backend and
//! report today's capture quota for the configured owner.

use anyhow::Context;
use tracing::info;

use snaptag_client::{connect, init_tracing, ClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let engine = connect(&config).context("failed to open local cache")?;

    let report = engine.sync().await.context("sync failed")?;
    println!(
        "synced {} objects for {} ({} local-only entries dropped)",
        report.fetched,
        engine.owner(),
        report.dropped_local
    );

    let quota = engine.check_quota().await.context("quota check failed")?;
    println!(
        "captures today: {}/{} ({})",
        quota.count,
        quota.limit,
        if quota.can_capture {
            format!("{} remaining", quota.remaining())
        } else {
            "limit reached".to_string()
        }
    );

    Ok(())
}
