//! Groups migration: create groups from the `groups.csv` export and
//! attach members by resolving their emails against the destination
//! tenant's users.

use async_trait::async_trait;
use tracing::info;

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::remap::EntityKind;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::groups as api;
use crate::services::errors::MigrationResult;
use crate::utils::csv_data::{load_rows, GroupRow};

use super::assign_roles::email_index;

pub struct GroupsStep;

#[async_trait]
impl super::MigrationStep for GroupsStep {
    fn kind(&self) -> StepKind {
        StepKind::Groups
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_groups(ctx).await
    }
}

async fn migrate_groups(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting groups migration");

    let path = ctx.config.data_dir.join("groups.csv");
    let rows: Vec<GroupRow> = load_rows(&path)?;
    report.fetched = rows.len();

    for row in &rows {
        if !row.has_members() {
            info!(
                "Skipping group '{}' as both userIds and userEmails are null.",
                row.name
            );
            report.skipped += 1;
            continue;
        }

        let group_id = match api::create_group_impl(
            ctx.destination,
            &row.tenant_id,
            &row.name,
            &row.description,
        )
        .await
        {
            Ok(group_id) => {
                info!("Successfully created group '{}' with ID: {}", row.name, group_id);
                ctx.remap.record(EntityKind::Group, &row.name, &group_id);
                ctx.emit(MigrationEvent::EntityMigrated {
                    kind: EntityKind::Group,
                    source_id: row.name.clone(),
                    dest_id: group_id.clone(),
                });
                report.created += 1;
                group_id
            }
            Err(e) => {
                ctx.emit(MigrationEvent::EntityFailed {
                    kind: EntityKind::Group,
                    id: row.name.clone(),
                    error: e.to_string(),
                });
                report.failed += 1;
                continue;
            }
        };

        attach_members(ctx, row, &group_id, &mut report).await;
    }

    report.log_summary("Groups migration");
    Ok(report)
}

async fn attach_members(
    ctx: &MigrationContext<'_>,
    row: &GroupRow,
    group_id: &str,
    report: &mut StepReport,
) {
    let users = match api::list_tenant_users_impl(ctx.destination, &row.tenant_id).await {
        Ok(users) => users,
        Err(e) => {
            ctx.warn(format!(
                "Failed to fetch users for tenant {}: {}",
                row.tenant_id, e
            ));
            report.failed += 1;
            return;
        }
    };
    let email_to_user_id = email_index(&users);

    let user_ids: Vec<String> = row
        .member_emails()
        .iter()
        .filter_map(|email| email_to_user_id.get(email).cloned())
        .collect();
    if user_ids.is_empty() {
        ctx.warn(format!("No valid user IDs found for group '{}'.", row.name));
        return;
    }

    match api::add_group_members_impl(ctx.destination, &row.tenant_id, group_id, &user_ids).await {
        Ok(()) => report.updated += 1,
        Err(e) => {
            ctx.emit(MigrationEvent::EntityFailed {
                kind: EntityKind::Group,
                id: row.name.clone(),
                error: format!("member assignment failed: {}", e),
            });
            report.failed += 1;
        }
    }
}
