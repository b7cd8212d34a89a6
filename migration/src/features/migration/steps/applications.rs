//! Applications migration.
//!
//! The platform allows exactly one default application and refuses to
//! delete the last one, so the order matters: create the source's
//! non-default applications first, then clear the destination's old
//! applications, then create the source default.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::remap::EntityKind;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::applications as api;
use crate::services::errors::MigrationResult;

pub struct ApplicationsStep;

#[async_trait]
impl super::MigrationStep for ApplicationsStep {
    fn kind(&self) -> StepKind {
        StepKind::Applications
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_applications(ctx).await
    }
}

fn app_name(app: &Value) -> &str {
    app.get("name").and_then(|v| v.as_str()).unwrap_or("Unknown")
}

fn is_default(app: &Value) -> bool {
    app.get("isDefault").and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Split applications into (default, non-default). The platform keeps at
/// most one default; extras are treated as non-default.
fn split_default(apps: &[Value]) -> (Option<&Value>, Vec<&Value>) {
    let mut default_app = None;
    let mut non_default = Vec::new();
    for app in apps {
        if is_default(app) && default_app.is_none() {
            default_app = Some(app);
        } else {
            non_default.push(app);
        }
    }
    (default_app, non_default)
}

async fn migrate_applications(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting applications migration process");

    let source_applications = api::get_applications_impl(ctx.source).await?;
    report.fetched = source_applications.len();
    if source_applications.is_empty() {
        ctx.warn("No applications found to migrate");
        return Ok(report);
    }

    let (source_default_app, non_default_apps) = split_default(&source_applications);
    if let Some(app) = source_default_app {
        info!("Found source default application: {}", app_name(app));
    }

    let dest_applications = api::get_applications_impl(ctx.destination).await?;
    info!(
        "Migration plan: {} non-default apps to create, {} destination apps to remove, default app: {}",
        non_default_apps.len(),
        dest_applications.len(),
        source_default_app.map(app_name).unwrap_or("none")
    );

    // Step 1: migrate all non-default applications.
    for app in &non_default_apps {
        create_application(ctx, app, &mut report).await;
    }

    // Step 2: remove the destination's old applications, but only when a
    // source default exists to take over afterwards.
    if !dest_applications.is_empty() && source_default_app.is_some() {
        info!("Removing ALL destination applications");
        for app in &dest_applications {
            let Some(app_id) = app.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            info!("Deleting destination app: {}", app_name(app));
            if let Err(e) = api::delete_application_impl(ctx.destination, app_id).await {
                ctx.warn(format!(
                    "Failed to delete {}: {}. Continuing anyway...",
                    app_name(app),
                    e
                ));
            }
        }
    }

    // Step 3: migrate the source default application.
    if let Some(app) = source_default_app {
        info!("Creating default application: {}", app_name(app));
        create_application(ctx, app, &mut report).await;
    }

    report.log_summary("Applications migration");
    info!("Applications migration completed");
    Ok(report)
}

async fn create_application(ctx: &mut MigrationContext<'_>, app: &Value, report: &mut StepReport) {
    let name = app_name(app).to_string();
    match api::create_application_impl(ctx.destination, app).await {
        Ok(created) => {
            info!(
                "Created application: {} (ID: {})",
                name,
                created.get("id").and_then(|v| v.as_str()).unwrap_or("N/A")
            );
            if let (Some(source_id), Some(dest_id)) = (
                app.get("id").and_then(|v| v.as_str()),
                created.get("id").and_then(|v| v.as_str()),
            ) {
                ctx.remap.record(EntityKind::Application, source_id, dest_id);
                ctx.emit(MigrationEvent::EntityMigrated {
                    kind: EntityKind::Application,
                    source_id: source_id.to_string(),
                    dest_id: dest_id.to_string(),
                });
            }
            report.created += 1;
        }
        Err(e) => {
            ctx.emit(MigrationEvent::EntityFailed {
                kind: EntityKind::Application,
                id: name,
                error: e.to_string(),
            });
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_default() {
        let apps = vec![
            json!({ "id": "a-1", "name": "Portal", "isDefault": false }),
            json!({ "id": "a-2", "name": "Main", "isDefault": true }),
            json!({ "id": "a-3", "name": "Docs" }),
        ];
        let (default_app, non_default) = split_default(&apps);
        assert_eq!(default_app.map(app_name), Some("Main"));
        assert_eq!(non_default.len(), 2);
    }

    #[test]
    fn test_split_default_without_default() {
        let apps = vec![json!({ "id": "a-1", "name": "Portal" })];
        let (default_app, non_default) = split_default(&apps);
        assert!(default_app.is_none());
        assert_eq!(non_default.len(), 1);
    }
}
