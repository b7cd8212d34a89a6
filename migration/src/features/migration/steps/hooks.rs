//! Webhook (prehook) migration: clear the destination's hook
//! configurations, then recreate every source hook, pulling custom code
//! across for CUSTOM_CODE hooks.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::hooks as api;
use crate::services::errors::MigrationResult;

pub struct PrehooksStep;

#[async_trait]
impl super::MigrationStep for PrehooksStep {
    fn kind(&self) -> StepKind {
        StepKind::Prehooks
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_hooks(ctx).await
    }
}

fn hook_name(hook: &Value) -> &str {
    hook.get("displayName")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
}

async fn migrate_hooks(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting webhook migration");

    info!("Fetching webhooks from source account...");
    let source_hooks = api::get_hooks_impl(ctx.source).await?;
    report.fetched = source_hooks.len();
    if source_hooks.is_empty() {
        ctx.warn("No webhooks found in source account");
        return Ok(report);
    }

    info!("Fetching webhooks from destination account...");
    let dest_hooks = api::get_hooks_impl(ctx.destination).await?;
    if !dest_hooks.is_empty() {
        info!(
            "Deleting {} existing webhook(s) in destination...",
            dest_hooks.len()
        );
        for hook in &dest_hooks {
            let Some(hook_id) = hook.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            if let Err(e) = api::delete_hook_impl(ctx.destination, hook_id).await {
                debug!("Failed to delete webhook {}: {}", hook_id, e);
            }
        }
        // Give the platform a moment before recreating.
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    info!("Migrating {} webhook(s)...", source_hooks.len());
    for hook in &source_hooks {
        migrate_one_hook(ctx, hook, &mut report).await;
    }

    if report.created > 0 {
        info!(
            "Successfully migrated {}/{} webhooks",
            report.created,
            source_hooks.len()
        );
    } else {
        ctx.emit(MigrationEvent::Error {
            message: "Failed to migrate webhooks".to_string(),
        });
    }
    report.log_summary("Webhook migration");
    Ok(report)
}

async fn migrate_one_hook(ctx: &MigrationContext<'_>, hook: &Value, report: &mut StepReport) {
    let name = hook_name(hook).to_string();
    let hook_type = hook.get("type").and_then(|v| v.as_str()).unwrap_or("Unknown");

    match hook_type {
        "CUSTOM_CODE" => {
            let Some(executor_id) = hook.get("executorIdentifier").and_then(|v| v.as_str()) else {
                ctx.emit(MigrationEvent::Error {
                    message: format!("No executor ID for custom code webhook {}", name),
                });
                report.failed += 1;
                return;
            };
            let code = match api::get_custom_code_impl(ctx.source, executor_id).await {
                Ok(code) if !code.content.is_empty() => code,
                Ok(_) | Err(_) => {
                    ctx.emit(MigrationEvent::Error {
                        message: format!("Could not retrieve code for {}", name),
                    });
                    report.failed += 1;
                    return;
                }
            };
            match api::create_custom_code_hook_impl(ctx.destination, hook, &code).await {
                Ok(()) => {
                    debug!("Created custom code webhook: {}", name);
                    report.created += 1;
                }
                Err(e) => {
                    ctx.emit(MigrationEvent::Error {
                        message: format!("Failed to create custom code webhook {}: {}", name, e),
                    });
                    report.failed += 1;
                }
            }
        }
        "API" => match api::create_api_hook_impl(ctx.destination, hook).await {
            Ok(()) => {
                debug!("Created API webhook: {}", name);
                report.created += 1;
            }
            Err(e) => {
                ctx.emit(MigrationEvent::Error {
                    message: format!("Failed to create API webhook {}: {}", name, e),
                });
                report.failed += 1;
            }
        },
        other => {
            ctx.warn(format!("Unknown webhook type: {}", other));
            report.skipped += 1;
        }
    }
}
