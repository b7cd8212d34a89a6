//! Users migration: transform the `user_migration_data.csv` export into
//! the platform's bulk-import shape and submit it to the destination's
//! CSV migration endpoint.
//!
//! When user-role migration is on, each row's roles are looked up at the
//! source and translated to destination role ids by role name, written as
//! a pipe-joined `roleIds` column.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::{identity, users as api};
use crate::services::errors::MigrationResult;
use crate::utils::csv_data::{normalize_metadata, normalize_phone, CsvTable};

pub struct UsersStep;

#[async_trait]
impl super::MigrationStep for UsersStep {
    fn kind(&self) -> StepKind {
        StepKind::Users
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_users(ctx).await
    }
}

/// Map source role ids to destination role ids by matching role names.
fn map_roles_by_name(source_roles: &[Value], dest_roles: &[Value]) -> HashMap<String, String> {
    let dest_ids_by_name: HashMap<&str, &str> = dest_roles
        .iter()
        .filter_map(|role| {
            let name = role.get("name").and_then(|v| v.as_str())?;
            let id = role.get("id").and_then(|v| v.as_str())?;
            Some((name, id))
        })
        .collect();

    source_roles
        .iter()
        .filter_map(|role| {
            let name = role.get("name").and_then(|v| v.as_str())?;
            let id = role.get("id").and_then(|v| v.as_str())?;
            let dest_id = dest_ids_by_name.get(name)?;
            Some((id.to_string(), dest_id.to_string()))
        })
        .collect()
}

async fn migrate_users(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting user migration");

    let input_path = ctx.config.data_dir.join("user_migration_data.csv");
    let output_path = ctx.config.data_dir.join("final_data.csv");

    let mut table = CsvTable::load(&input_path)?;
    report.fetched = table.len();
    if table.is_empty() {
        ctx.warn("User migration CSV contains no rows");
        return Ok(report);
    }

    table.map_column("metadata", normalize_metadata);

    if ctx.config.migration.user_roles {
        append_role_column(ctx, &mut table, &mut report).await?;
    }

    table.map_column("phoneNumber", normalize_phone);
    table.write(&output_path)?;
    info!("Generated transformed CSV file at {}", output_path.display());

    api::bulk_csv_migration_impl(ctx.destination, &output_path).await?;
    report.created = table.len();
    info!("User creation in destination account via CSV bulk migration completed");

    report.log_summary("Users migration");
    Ok(report)
}

async fn append_role_column(
    ctx: &MigrationContext<'_>,
    table: &mut CsvTable,
    report: &mut StepReport,
) -> MigrationResult<()> {
    let source_roles = identity::get_roles_impl(ctx.source).await?;
    let dest_roles = identity::get_roles_impl(ctx.destination).await?;
    let role_id_mapping = map_roles_by_name(&source_roles, &dest_roles);
    info!(
        "Role ID mapping covers {} of {} source roles",
        role_id_mapping.len(),
        source_roles.len()
    );

    let mut roles_column = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let email = table.get(row, "email").unwrap_or_default().to_string();
        let tenant_id = table.get(row, "tenantId").unwrap_or_default().to_string();
        if email.is_empty() || tenant_id.is_empty() {
            ctx.warn(format!("Row {} is missing email or tenantId", row + 1));
            roles_column.push(String::new());
            report.skipped += 1;
            continue;
        }

        match api::find_user_id_by_email_impl(ctx.source, &email, &tenant_id).await {
            Ok(Some(user_id)) => {
                let source_role_ids = api::get_user_role_ids_impl(ctx.source, &user_id, &tenant_id)
                    .await
                    .unwrap_or_default();
                let translated: Vec<String> = source_role_ids
                    .iter()
                    .filter_map(|id| role_id_mapping.get(id).cloned())
                    .collect();
                debug!("User {} - Translated Role IDs: {:?}", email, translated);
                roles_column.push(translated.join("|"));
            }
            Ok(None) => {
                ctx.warn(format!("User ID not found for {} in source client", email));
                roles_column.push(String::new());
            }
            Err(e) => {
                ctx.warn(format!("Failed to look up {}: {}", email, e));
                roles_column.push(String::new());
                report.failed += 1;
            }
        }
    }
    table.push_column("roleIds", roles_column);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named_role(id: &str, name: &str) -> Value {
        json!({ "id": id, "name": name })
    }

    #[test]
    fn test_map_roles_by_name() {
        let source = vec![
            named_role("s-1", "Editor"),
            named_role("s-2", "Viewer"),
            named_role("s-3", "Owner"),
        ];
        let dest = vec![named_role("d-1", "Editor"), named_role("d-2", "Viewer")];

        let mapping = map_roles_by_name(&source, &dest);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["s-1"], "d-1");
        assert_eq!(mapping["s-2"], "d-2");
        // Owner has no destination counterpart: dependent users keep an
        // empty role list instead of failing.
        assert!(!mapping.contains_key("s-3"));
    }

    #[test]
    fn test_map_roles_by_name_with_empty_destination() {
        let source = vec![named_role("s-1", "Editor")];
        assert!(map_roles_by_name(&source, &[]).is_empty());
    }
}
