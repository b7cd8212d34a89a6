//! Tenant migration: create missing tenants at the destination, then copy
//! tenant metadata. Tenant ids are caller-chosen on this platform, so the
//! destination keeps the source ids.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::remap::EntityKind;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::tenants as api;
use crate::services::errors::MigrationResult;

pub struct TenantsStep;

#[async_trait]
impl super::MigrationStep for TenantsStep {
    fn kind(&self) -> StepKind {
        StepKind::Tenants
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_tenants(ctx).await
    }
}

async fn migrate_tenants(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting tenant migration process");

    let source_tenants = api::get_tenants_impl(ctx.source).await?;
    report.fetched = source_tenants.len();
    if source_tenants.is_empty() {
        ctx.warn("No tenants found to migrate");
        return Ok(report);
    }

    let existing: HashSet<String> = api::get_tenants_impl(ctx.destination)
        .await?
        .iter()
        .filter_map(|t| t.get("tenantId").and_then(|v| v.as_str()))
        .map(|id| id.to_string())
        .collect();

    for tenant in &source_tenants {
        let Some(tenant_id) = tenant.get("tenantId").and_then(|v| v.as_str()) else {
            ctx.warn("Skipping tenant record without tenantId");
            report.skipped += 1;
            continue;
        };

        if existing.contains(tenant_id) {
            debug!("Tenant {} already exists in destination, skipping", tenant_id);
            ctx.remap.record(EntityKind::Tenant, tenant_id, tenant_id);
            report.skipped += 1;
            continue;
        }

        match api::create_tenant_impl(ctx.destination, tenant).await {
            Ok(_) => {
                ctx.remap.record(EntityKind::Tenant, tenant_id, tenant_id);
                ctx.emit(MigrationEvent::EntityMigrated {
                    kind: EntityKind::Tenant,
                    source_id: tenant_id.to_string(),
                    dest_id: tenant_id.to_string(),
                });
                report.created += 1;
            }
            Err(e) => {
                ctx.emit(MigrationEvent::EntityFailed {
                    kind: EntityKind::Tenant,
                    id: tenant_id.to_string(),
                    error: e.to_string(),
                });
                report.failed += 1;
            }
        }
    }

    migrate_tenant_metadata(ctx, &source_tenants, &mut report).await;

    report.log_summary("Tenant migration");
    info!("Tenant migration completed");
    Ok(report)
}

/// The metadata field arrives either as a JSON string or as an already
/// parsed object, depending on the export path.
fn parse_metadata(tenant: &Value) -> Option<Result<Value, ()>> {
    match tenant.get("metadata") {
        Some(Value::String(raw)) if !raw.trim().is_empty() => {
            Some(serde_json::from_str(raw).map_err(|_| ()))
        }
        Some(value @ Value::Object(_)) => Some(Ok(value.clone())),
        _ => None,
    }
}

async fn migrate_tenant_metadata(
    ctx: &MigrationContext<'_>,
    source_tenants: &[Value],
    report: &mut StepReport,
) {
    let with_metadata: Vec<&Value> = source_tenants
        .iter()
        .filter(|t| parse_metadata(t).is_some())
        .collect();
    if with_metadata.is_empty() {
        return;
    }

    info!("Migrating metadata for {} tenants", with_metadata.len());
    for tenant in with_metadata {
        let Some(tenant_id) = tenant.get("tenantId").and_then(|v| v.as_str()) else {
            continue;
        };
        match parse_metadata(tenant) {
            Some(Ok(metadata)) => {
                match api::set_tenant_metadata_impl(ctx.destination, tenant_id, &metadata).await {
                    Ok(()) => {
                        info!("Updated metadata for tenant {}", tenant_id);
                        report.updated += 1;
                    }
                    Err(e) => {
                        ctx.emit(MigrationEvent::EntityFailed {
                            kind: EntityKind::Tenant,
                            id: tenant_id.to_string(),
                            error: format!("metadata update failed: {}", e),
                        });
                        report.failed += 1;
                    }
                }
            }
            Some(Err(())) => {
                ctx.warn(format!("Invalid metadata for tenant {}", tenant_id));
                report.skipped += 1;
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_metadata_variants() {
        let as_string = json!({ "tenantId": "t-1", "metadata": "{\"tier\": \"gold\"}" });
        assert_eq!(
            parse_metadata(&as_string),
            Some(Ok(json!({ "tier": "gold" })))
        );

        let as_object = json!({ "tenantId": "t-1", "metadata": { "tier": "gold" } });
        assert_eq!(
            parse_metadata(&as_object),
            Some(Ok(json!({ "tier": "gold" })))
        );

        let invalid = json!({ "tenantId": "t-1", "metadata": "{broken" });
        assert_eq!(parse_metadata(&invalid), Some(Err(())));

        assert_eq!(parse_metadata(&json!({ "tenantId": "t-1" })), None);
        assert_eq!(
            parse_metadata(&json!({ "tenantId": "t-1", "metadata": "" })),
            None
        );
    }
}
