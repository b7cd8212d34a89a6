//! Settings migration: permission categories and permissions.
//!
//! Categories are matched across accounts by name and description, since
//! the platform assigns fresh category ids. Permissions then have their
//! `categoryId` rewritten through that mapping before batch creation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::remap::EntityKind;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::identity::{self, PERMISSION_BATCH_SIZE};
use crate::services::errors::MigrationResult;

pub struct SettingsStep;

#[async_trait]
impl super::MigrationStep for SettingsStep {
    fn kind(&self) -> StepKind {
        StepKind::Settings
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_settings(ctx).await
    }
}

/// Map source category ids to destination category ids by matching name
/// and description.
fn map_categories_by_identity(
    source_categories: &[Value],
    destination_categories: &[Value],
) -> HashMap<String, String> {
    let mut mapping = HashMap::new();
    for src_cat in source_categories {
        let Some(src_id) = src_cat.get("id").and_then(|v| v.as_str()) else {
            continue;
        };
        let src_name = src_cat.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        let src_description = src_cat
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let matching = destination_categories.iter().find(|dest_cat| {
            dest_cat.get("name").and_then(|v| v.as_str()).unwrap_or_default() == src_name
                && dest_cat
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    == src_description
        });
        if let Some(dest_id) = matching.and_then(|c| c.get("id")).and_then(|v| v.as_str()) {
            mapping.insert(src_id.to_string(), dest_id.to_string());
        }
    }
    mapping
}

async fn migrate_settings(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    let flags = ctx.config.migration.clone();
    info!("Starting settings migration");

    let source_categories = identity::get_categories_impl(ctx.source).await?;
    let destination_categories = identity::get_categories_impl(ctx.destination).await?;
    report.fetched = source_categories.len();

    let mut category_mapping =
        map_categories_by_identity(&source_categories, &destination_categories);
    info!(
        "Category mapping completed with {} mapped categories",
        category_mapping.len()
    );

    if flags.categories {
        let to_create: Vec<&Value> = source_categories
            .iter()
            .filter(|cat| {
                cat.get("id")
                    .and_then(|v| v.as_str())
                    .map(|id| !category_mapping.contains_key(id))
                    .unwrap_or(false)
            })
            .collect();

        for category in to_create {
            let source_id = category
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let name = category
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let description = category
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            match identity::create_category_impl(ctx.destination, name, description).await {
                Ok(dest_id) => {
                    info!("Category '{}' created with ID: {}", name, dest_id);
                    category_mapping.insert(source_id.to_string(), dest_id);
                    report.created += 1;
                }
                Err(e) if e.is_already_exists() => {
                    info!("Category '{}' already exists. Skipping.", name);
                    report.skipped += 1;
                }
                Err(e) => {
                    ctx.emit(MigrationEvent::EntityFailed {
                        kind: EntityKind::Category,
                        id: name.to_string(),
                        error: e.to_string(),
                    });
                    report.failed += 1;
                }
            }
        }
    }

    for (source_id, dest_id) in &category_mapping {
        ctx.remap.record(EntityKind::Category, source_id, dest_id);
    }

    if flags.permissions {
        migrate_permissions(ctx, &mut report).await?;
    } else {
        info!("Skipping permissions migration as per configuration");
    }

    report.log_summary("Settings migration");
    Ok(report)
}

async fn migrate_permissions(
    ctx: &MigrationContext<'_>,
    report: &mut StepReport,
) -> MigrationResult<()> {
    let source_permissions = identity::get_permissions_impl(ctx.source).await?;
    info!(
        "Source permissions retrieved for migration: {} permissions",
        source_permissions.len()
    );

    let mut to_migrate = Vec::new();
    for permission in &source_permissions {
        let name = permission
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let Some(key) = permission.get("key").and_then(|v| v.as_str()) else {
            ctx.warn(format!("Permission '{}' has no key. Skipping.", name));
            report.skipped += 1;
            continue;
        };
        let Some(category_id) = permission.get("categoryId").and_then(|v| v.as_str()) else {
            ctx.warn(format!("Permission '{}' has no categoryId. Skipping.", name));
            report.skipped += 1;
            continue;
        };

        match ctx.remap.lookup(EntityKind::Category, category_id) {
            Ok(dest_category_id) => {
                to_migrate.push(json!({
                    "key": key,
                    "name": name,
                    "description": permission
                        .get("description")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default(),
                    "categoryId": dest_category_id,
                }));
            }
            Err(_) => {
                ctx.warn(format!(
                    "Destination category mapping for permission '{}' with source category ID '{}' not found. Skipping.",
                    name, category_id
                ));
                report.skipped += 1;
            }
        }
    }

    if to_migrate.is_empty() {
        info!("No permissions with valid categories to migrate from the source");
        return Ok(());
    }

    info!(
        "{} permissions matched with categories for migration",
        to_migrate.len()
    );
    for batch in to_migrate.chunks(PERMISSION_BATCH_SIZE) {
        match identity::create_permissions_batch_impl(ctx.destination, batch).await {
            Ok(()) => report.created += batch.len(),
            Err(e) => {
                ctx.emit(MigrationEvent::Error {
                    message: format!("Error creating permissions batch: {}", e),
                });
                report.failed += batch.len();
            }
        }
    }
    info!("Permissions creation completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::migration::remap::RemapTable;

    fn category(id: &str, name: &str, description: &str) -> Value {
        json!({ "id": id, "name": name, "description": description })
    }

    #[test]
    fn test_category_mapping_matches_name_and_description() {
        let source = vec![
            category("s-1", "Admin", "admin perms"),
            category("s-2", "Billing", "billing perms"),
            category("s-3", "Reports", ""),
        ];
        let destination = vec![
            category("d-1", "Admin", "admin perms"),
            // Same name, different description: no match.
            category("d-2", "Billing", "finance perms"),
        ];

        let mapping = map_categories_by_identity(&source, &destination);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["s-1"], "d-1");
        assert!(!mapping.contains_key("s-2"));
        assert!(!mapping.contains_key("s-3"));
    }

    #[test]
    fn test_category_mapping_tolerates_missing_description() {
        let source = vec![json!({ "id": "s-1", "name": "Ops" })];
        let destination = vec![category("d-1", "Ops", "")];
        let mapping = map_categories_by_identity(&source, &destination);
        assert_eq!(mapping["s-1"], "d-1");
    }

    #[test]
    fn test_permission_with_unmapped_category_is_a_remap_miss() {
        // Documents the fixed-order requirement: running permissions
        // before categories leaves the remap table empty, so every
        // permission is un-migratable.
        let table = RemapTable::new();
        assert!(table.lookup(EntityKind::Category, "cat-1").is_err());
    }
}
