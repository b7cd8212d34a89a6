//! Deletion entry point: remove data from the destination account
//! (account 2) per the `DELETE_*` flag set.

use anyhow::Context;
use migration::features::deletion;
use migration::services::client::VendorClient;
use migration::services::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env().context("Error parsing configuration from environment")?;
    migration::logging::init(&config.log_file)?;

    tracing::info!("=== Account Data Deletion Starting ===");

    if deletion::deletion_plan(&config.deletion).is_empty() {
        tracing::warn!("No deletion steps enabled; nothing to do");
        return Ok(());
    }

    let destination = VendorClient::connect(&config.destination)
        .await
        .context("Authentication failed for destination account; deletion aborted")?;

    let reports = deletion::run(&config.deletion, &destination).await;

    let total_deleted: usize = reports.iter().map(|(_, r)| r.deleted).sum();
    let total_failed: usize = reports.iter().map(|(_, r)| r.failed).sum();
    if total_failed == 0 {
        tracing::info!("Deletion completed: {} entities removed", total_deleted);
    } else {
        tracing::warn!(
            "Deletion completed: {} entities removed, {} failures; see the log for details",
            total_deleted,
            total_failed
        );
    }

    Ok(())
}
