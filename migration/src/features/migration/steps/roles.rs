//! Roles migration: deduplicate against the destination by role key,
//! create account-wide roles in one batch and tenant-scoped roles
//! individually, then reattach permissions through the key-based
//! permission mapping.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::remap::EntityKind;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::identity;
use crate::services::errors::MigrationResult;

pub struct RolesStep;

#[async_trait]
impl super::MigrationStep for RolesStep {
    fn kind(&self) -> StepKind {
        StepKind::Roles
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_roles(ctx).await
    }
}

fn role_field<'a>(role: &'a Value, field: &str) -> &'a str {
    role.get(field).and_then(|v| v.as_str()).unwrap_or_default()
}

fn role_tenant(role: &Value) -> Option<&str> {
    role.get("tenantId")
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
}

/// Drop roles whose key already exists at the destination and key
/// duplicates within the source. Returns the surviving roles plus the
/// number dropped for each reason.
fn select_new_roles(source_roles: &[Value], dest_role_keys: &HashSet<String>) -> (Vec<Value>, usize, usize) {
    let mut seen_keys = HashSet::new();
    let mut unique = Vec::new();
    let mut existing = 0;
    let mut duplicates = 0;

    for role in source_roles {
        let key = role_field(role, "key").to_string();
        if dest_role_keys.contains(&key) {
            debug!("Role '{}' already exists in destination. Skipping.", key);
            existing += 1;
            continue;
        }
        if !seen_keys.insert(key.clone()) {
            debug!("Duplicate role found with key '{}'. Skipping duplicate.", key);
            duplicates += 1;
            continue;
        }
        unique.push(role.clone());
    }
    (unique, existing, duplicates)
}

/// Creation payload for one role; tenant-scoped roles also carry their
/// `tenantId` in the body.
fn role_creation_body(role: &Value) -> Value {
    let mut body = json!({
        "name": role_field(role, "name"),
        "key": role_field(role, "key"),
        "description": role_field(role, "description"),
        "isDefault": role.get("isDefault").and_then(|v| v.as_bool()).unwrap_or(false),
        "level": role.get("level").cloned().unwrap_or(Value::from(0)),
    });
    if let Some(tenant_id) = role_tenant(role) {
        body["tenantId"] = Value::String(tenant_id.to_string());
    }
    body
}

/// Translate a role's source permission ids into destination permission
/// ids via the permission key. Returns the translated ids and how many
/// could not be resolved.
fn translate_role_permissions(
    role: &Value,
    source_permissions_by_id: &HashMap<String, Value>,
    dest_permission_ids_by_key: &HashMap<String, String>,
) -> (Vec<String>, usize) {
    let mut permission_ids = Vec::new();
    let mut misses = 0;

    let source_ids = role
        .get("permissions")
        .and_then(|p| p.as_array())
        .cloned()
        .unwrap_or_default();
    for perm_id in source_ids {
        let Some(perm_id) = perm_id.as_str() else {
            misses += 1;
            continue;
        };
        let Some(source_permission) = source_permissions_by_id.get(perm_id) else {
            debug!("Permission ID '{}' not found in source permissions.", perm_id);
            misses += 1;
            continue;
        };
        let key = role_field(source_permission, "key");
        match dest_permission_ids_by_key.get(key) {
            Some(dest_id) => permission_ids.push(dest_id.clone()),
            None => {
                debug!("Permission key '{}' not found in destination. Skipping.", key);
                misses += 1;
            }
        }
    }
    (permission_ids, misses)
}

async fn migrate_roles(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting roles migration");

    let source_roles = identity::get_roles_impl(ctx.source).await?;
    let source_permissions = identity::get_permissions_impl(ctx.source).await?;
    let dest_roles = identity::get_roles_impl(ctx.destination).await?;
    let dest_permissions = identity::get_permissions_impl(ctx.destination).await?;
    report.fetched = source_roles.len();

    let source_permissions_by_id: HashMap<String, Value> = source_permissions
        .iter()
        .filter_map(|p| {
            p.get("id")
                .and_then(|v| v.as_str())
                .map(|id| (id.to_string(), p.clone()))
        })
        .collect();
    let dest_permission_ids_by_key: HashMap<String, String> = dest_permissions
        .iter()
        .filter_map(|p| {
            let key = p.get("key").and_then(|v| v.as_str())?;
            let id = p.get("id").and_then(|v| v.as_str())?;
            Some((key.to_string(), id.to_string()))
        })
        .collect();
    let dest_role_keys: HashSet<String> = dest_roles
        .iter()
        .map(|r| role_field(r, "key").to_string())
        .collect();

    let (unique_roles, existing, duplicates) = select_new_roles(&source_roles, &dest_role_keys);
    report.skipped += existing + duplicates;
    if unique_roles.is_empty() {
        info!("No new roles to create after filtering out existing roles");
        return Ok(report);
    }

    let (with_tenant, without_tenant): (Vec<Value>, Vec<Value>) = unique_roles
        .iter()
        .cloned()
        .partition(|role| role_tenant(role).is_some());

    // Account-wide roles go up as one array.
    if !without_tenant.is_empty() {
        let payloads: Vec<Value> = without_tenant.iter().map(role_creation_body).collect();
        info!(
            "Sending array of {} roles to create without tenantId",
            payloads.len()
        );
        match identity::create_roles_batch_impl(ctx.destination, &payloads).await {
            Ok(created_roles) => {
                for (original, created) in without_tenant.iter().zip(created_roles.iter()) {
                    record_created_role(ctx, original, created, &mut report);
                }
            }
            Err(e) if e.is_already_exists() => {
                info!("Some roles already exist. Skipping those.");
                report.skipped += without_tenant.len();
            }
            Err(e) => {
                ctx.emit(MigrationEvent::Error {
                    message: format!("Error creating roles without tenantId: {}", e),
                });
                report.failed += without_tenant.len();
            }
        }
    }

    // Tenant-scoped roles are created one by one under their tenant header.
    for role in &with_tenant {
        let tenant_id = role_tenant(role).unwrap_or_default().to_string();
        let name = role_field(role, "name").to_string();
        info!("Creating role '{}' with tenantId '{}'", name, tenant_id);

        match identity::create_tenant_role_impl(ctx.destination, &role_creation_body(role), &tenant_id)
            .await
        {
            Ok(created_roles) => {
                for created in &created_roles {
                    record_created_role(ctx, role, created, &mut report);
                }
            }
            Err(e) if e.is_already_exists() => {
                info!("Role already exists. Skipping.");
                report.skipped += 1;
            }
            Err(e) => {
                ctx.emit(MigrationEvent::EntityFailed {
                    kind: EntityKind::Role,
                    id: name,
                    error: e.to_string(),
                });
                report.failed += 1;
            }
        }
    }

    assign_permissions_to_roles(
        ctx,
        &unique_roles,
        &source_permissions_by_id,
        &dest_permission_ids_by_key,
        &mut report,
    )
    .await;

    report.log_summary("Roles migration");
    info!("Roles migration completed");
    Ok(report)
}

fn record_created_role(
    ctx: &mut MigrationContext<'_>,
    original: &Value,
    created: &Value,
    report: &mut StepReport,
) {
    let source_id = role_field(original, "id");
    let Some(created_id) = created.get("id").and_then(|v| v.as_str()) else {
        return;
    };
    ctx.remap.record(EntityKind::Role, source_id, created_id);
    ctx.emit(MigrationEvent::EntityMigrated {
        kind: EntityKind::Role,
        source_id: source_id.to_string(),
        dest_id: created_id.to_string(),
    });
    info!(
        "Role '{}' created with ID: {}",
        role_field(original, "name"),
        created_id
    );
    report.created += 1;
}

async fn assign_permissions_to_roles(
    ctx: &MigrationContext<'_>,
    roles: &[Value],
    source_permissions_by_id: &HashMap<String, Value>,
    dest_permission_ids_by_key: &HashMap<String, String>,
    report: &mut StepReport,
) {
    info!("Assigning permissions to roles");
    for role in roles {
        let name = role_field(role, "name");
        let dest_role_id = match ctx.remap.lookup(EntityKind::Role, role_field(role, "id")) {
            Ok(id) => id.to_string(),
            Err(_) => {
                debug!(
                    "No matching destination role ID for role '{}'. Skipping permission assignment.",
                    name
                );
                continue;
            }
        };

        let (permission_ids, misses) =
            translate_role_permissions(role, source_permissions_by_id, dest_permission_ids_by_key);
        report.skipped += misses;
        if permission_ids.is_empty() {
            debug!("No permissions to assign for role '{}'", name);
            continue;
        }

        match identity::set_role_permissions_impl(
            ctx.destination,
            &dest_role_id,
            &permission_ids,
            role_tenant(role),
        )
        .await
        {
            Ok(()) => {
                info!(
                    "Permissions assigned to role '{}' (ID: {})",
                    name, dest_role_id
                );
                report.updated += 1;
            }
            Err(e) => {
                ctx.emit(MigrationEvent::EntityFailed {
                    kind: EntityKind::Role,
                    id: name.to_string(),
                    error: format!("permission assignment failed: {}", e),
                });
                report.failed += 1;
            }
        }
    }
    info!("Permissions assignment to roles completed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: &str, key: &str, tenant: Option<&str>, permissions: &[&str]) -> Value {
        let mut value = json!({
            "id": id,
            "key": key,
            "name": key,
            "level": 1,
            "permissions": permissions,
        });
        if let Some(tenant) = tenant {
            value["tenantId"] = Value::String(tenant.to_string());
        }
        value
    }

    #[test]
    fn test_select_new_roles_filters_existing_and_duplicates() {
        let source = vec![
            role("r-1", "admin", None, &[]),
            role("r-2", "editor", None, &[]),
            role("r-3", "editor", Some("t-1"), &[]),
            role("r-4", "viewer", None, &[]),
        ];
        let dest_keys: HashSet<String> = ["viewer".to_string()].into();

        let (unique, existing, duplicates) = select_new_roles(&source, &dest_keys);
        assert_eq!(existing, 1);
        assert_eq!(duplicates, 1);
        let keys: Vec<&str> = unique.iter().map(|r| role_field(r, "key")).collect();
        assert_eq!(keys, vec!["admin", "editor"]);
    }

    #[test]
    fn test_role_creation_body_carries_tenant_only_when_scoped() {
        let scoped = role("r-1", "support", Some("t-9"), &[]);
        let body = role_creation_body(&scoped);
        assert_eq!(body["tenantId"], "t-9");
        assert_eq!(body["key"], "support");
        assert_eq!(body["isDefault"], false);

        let account_wide = role("r-2", "admin", None, &[]);
        assert!(role_creation_body(&account_wide).get("tenantId").is_none());
    }

    #[test]
    fn test_translate_role_permissions_resolves_by_key() {
        let source_permissions_by_id: HashMap<String, Value> = [
            ("p-1".to_string(), json!({ "id": "p-1", "key": "users.read" })),
            ("p-2".to_string(), json!({ "id": "p-2", "key": "users.write" })),
        ]
        .into();
        let dest_ids_by_key: HashMap<String, String> =
            [("users.read".to_string(), "dp-1".to_string())].into();

        let role = role("r-1", "admin", None, &["p-1", "p-2", "p-ghost"]);
        let (ids, misses) =
            translate_role_permissions(&role, &source_permissions_by_id, &dest_ids_by_key);
        assert_eq!(ids, vec!["dp-1".to_string()]);
        // users.write has no destination counterpart, p-ghost no source record.
        assert_eq!(misses, 2);
    }

    #[test]
    fn test_translate_role_permissions_with_empty_mappings_skips_everything() {
        // A roles run before the settings step has nothing to resolve
        // against: every permission is a miss, none panic.
        let role = role("r-1", "admin", None, &["p-1", "p-2"]);
        let (ids, misses) = translate_role_permissions(&role, &HashMap::new(), &HashMap::new());
        assert!(ids.is_empty());
        assert_eq!(misses, 2);
    }
}
