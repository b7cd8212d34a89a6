//! Migration entry point: copy account data from account 1 (source) to
//! account 2 (destination) per the `.env` flag set.

use anyhow::Context;
use migration::features::migration::{orchestrator, MigrationContext, MigrationPlan};
use migration::services::client::VendorClient;
use migration::services::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env().context("Error parsing configuration from environment")?;
    migration::logging::init(&config.log_file)?;

    tracing::info!("=== Migration Process Starting ===");

    let plan = MigrationPlan::build(&config.migration);
    if plan.is_empty() {
        tracing::warn!("No migration steps enabled; nothing to do");
        return Ok(());
    }

    tracing::info!("Initializing clients");
    let source = VendorClient::connect(&config.source)
        .await
        .context("Authentication failed for source account; migration aborted")?;
    let destination = VendorClient::connect(&config.destination)
        .await
        .context("Authentication failed for destination account; migration aborted")?;

    plan.log_scheduled_tasks();

    let mut ctx = MigrationContext::new(&source, &destination, &config);
    let report = orchestrator::run(&plan, &mut ctx).await;

    for (kind, step_report) in &report.steps {
        step_report.log_summary(kind.title());
    }
    for (kind, error) in &report.failed_steps {
        tracing::error!("{} did not run: {}", kind.title(), error);
    }

    if report.fully_successful() {
        tracing::info!("Migration process completed successfully!");
    } else {
        tracing::warn!(
            "Migration completed with {} failed entities and {} failed steps; see the log for details",
            report.total_failed_entities(),
            report.failed_steps.len()
        );
    }

    Ok(())
}
