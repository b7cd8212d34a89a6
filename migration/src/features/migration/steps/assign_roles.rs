//! Role assignment: give destination users the roles named in the
//! `assign_roles_to_users.csv` export, translating role names through the
//! `roles_in_destination.csv` mapping.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::users as api;
use crate::services::errors::MigrationResult;
use crate::utils::csv_data::{load_rows, DestinationRoleRow, RoleAssignmentRow};

pub struct AssignRolesStep;

#[async_trait]
impl super::MigrationStep for AssignRolesStep {
    fn kind(&self) -> StepKind {
        StepKind::AssignRoles
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        assign_roles(ctx).await
    }
}

/// Build the role-name → destination-role-id mapping.
fn role_mapping(rows: &[DestinationRoleRow]) -> HashMap<String, String> {
    rows.iter()
        .filter_map(|row| {
            let name = row.name.trim();
            let role_id = row.role_id.trim();
            (!name.is_empty() && !role_id.is_empty())
                .then(|| (name.to_string(), role_id.to_string()))
        })
        .collect()
}

/// Index users by email.
pub(crate) fn email_index(users: &[Value]) -> HashMap<String, String> {
    users
        .iter()
        .filter_map(|user| {
            let email = user.get("email").and_then(|v| v.as_str())?.trim();
            let id = user.get("id").and_then(|v| v.as_str())?;
            (!email.is_empty()).then(|| (email.to_string(), id.to_string()))
        })
        .collect()
}

/// Group assignment rows by (email, tenant) so each user gets a single
/// aggregated request per tenant.
fn group_assignments(
    rows: &[RoleAssignmentRow],
) -> BTreeMap<(String, String), Vec<&RoleAssignmentRow>> {
    let mut groups: BTreeMap<(String, String), Vec<&RoleAssignmentRow>> = BTreeMap::new();
    for row in rows {
        let key = (
            row.email.trim().to_string(),
            row.tenant_id.trim().to_string(),
        );
        groups.entry(key).or_default().push(row);
    }
    groups
}

async fn assign_roles(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting role assignment process");

    let mapping_path = ctx.config.data_dir.join("roles_in_destination.csv");
    let assignments_path = ctx.config.data_dir.join("assign_roles_to_users.csv");

    let mapping_rows: Vec<DestinationRoleRow> = load_rows(&mapping_path)?;
    let mapping = role_mapping(&mapping_rows);
    info!("Role mapping covers {} role names", mapping.len());

    let assignments: Vec<RoleAssignmentRow> = load_rows(&assignments_path)?;
    report.fetched = assignments.len();

    let dest_users = api::list_all_users_impl(ctx.destination).await?;
    let email_to_user_id = email_index(&dest_users);

    for ((email, tenant_id), rows) in group_assignments(&assignments) {
        let Some(user_id) = email_to_user_id.get(&email) else {
            ctx.warn(format!("Destination user not found for email: {}", email));
            report.skipped += rows.len();
            continue;
        };

        let role_ids: Vec<String> = rows
            .iter()
            .filter_map(|row| mapping.get(row.name.trim()).cloned())
            .collect();
        if role_ids.is_empty() {
            ctx.warn(format!(
                "No valid roles to assign for destination user {} (email: {})",
                user_id, email
            ));
            report.skipped += rows.len();
            continue;
        }

        info!(
            "Assigning roles {:?} to destination user {} for tenant '{}'",
            role_ids, user_id, tenant_id
        );
        match api::assign_user_roles_impl(ctx.destination, user_id, &tenant_id, &role_ids).await {
            Ok(()) => {
                info!(
                    "Successfully assigned roles to user {} in tenant {}",
                    user_id, tenant_id
                );
                report.updated += 1;
            }
            Err(e) => {
                ctx.emit(MigrationEvent::Error {
                    message: format!(
                        "Failed to assign roles to user {} in tenant {}: {}",
                        user_id, tenant_id, e
                    ),
                });
                report.failed += 1;
            }
        }
    }

    report.log_summary("Role assignment");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignment(email: &str, tenant: &str, role_name: &str) -> RoleAssignmentRow {
        RoleAssignmentRow {
            email: email.to_string(),
            user_id: String::new(),
            role_id: String::new(),
            name: role_name.to_string(),
            tenant_id: tenant.to_string(),
        }
    }

    #[test]
    fn test_role_mapping_skips_blank_rows() {
        let rows = vec![
            DestinationRoleRow {
                role_id: "d-1".to_string(),
                name: "Editor".to_string(),
            },
            DestinationRoleRow {
                role_id: String::new(),
                name: "Ghost".to_string(),
            },
        ];
        let mapping = role_mapping(&rows);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["Editor"], "d-1");
    }

    #[test]
    fn test_email_index() {
        let users = vec![
            json!({ "id": "u-1", "email": " ada@example.com " }),
            json!({ "id": "u-2", "email": "grace@example.com" }),
            json!({ "id": "u-3" }),
        ];
        let index = email_index(&users);
        assert_eq!(index.len(), 2);
        assert_eq!(index["ada@example.com"], "u-1");
    }

    #[test]
    fn test_group_assignments_aggregates_per_user_and_tenant() {
        let rows = vec![
            assignment("ada@example.com", "t-1", "Editor"),
            assignment("ada@example.com", "t-1", "Viewer"),
            assignment("ada@example.com", "t-2", "Editor"),
            assignment("grace@example.com", "t-1", "Owner"),
        ];
        let groups = group_assignments(&rows);
        assert_eq!(groups.len(), 3);
        assert_eq!(
            groups[&("ada@example.com".to_string(), "t-1".to_string())].len(),
            2
        );
    }
}
