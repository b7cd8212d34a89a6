//! Bulk invite: group the `user_tenants_with_roles.csv` export by tenant
//! and send one invite batch per tenant.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::users as api;
use crate::services::errors::MigrationResult;
use crate::utils::csv_data::{load_rows, InviteRow};

pub struct BulkInviteStep;

#[async_trait]
impl super::MigrationStep for BulkInviteStep {
    fn kind(&self) -> StepKind {
        StepKind::BulkInvite
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        run_bulk_invite(ctx).await
    }
}

type InvitesByTenant = BTreeMap<String, BTreeMap<String, (String, BTreeSet<String>)>>;

/// Group rows as tenant → email → (name, role ids), deduplicating role
/// ids per user. Rows missing a required field are dropped and counted.
fn group_invites(rows: &[InviteRow]) -> (InvitesByTenant, usize) {
    let mut grouped: InvitesByTenant = BTreeMap::new();
    let mut skipped = 0;

    for row in rows {
        let tenant_id = row.tenant_id.trim();
        let email = row.email.trim();
        let role_id = row.role_id.trim();
        if tenant_id.is_empty() || email.is_empty() || role_id.is_empty() {
            skipped += 1;
            continue;
        }
        let entry = grouped
            .entry(tenant_id.to_string())
            .or_default()
            .entry(email.to_string())
            .or_insert_with(|| (row.name.trim().to_string(), BTreeSet::new()));
        entry.1.insert(role_id.to_string());
    }
    (grouped, skipped)
}

async fn run_bulk_invite(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting bulk invite process");

    let path = ctx.config.data_dir.join("user_tenants_with_roles.csv");
    let rows: Vec<InviteRow> = load_rows(&path)?;
    report.fetched = rows.len();
    info!("Number of rows read from CSV: {}", rows.len());

    let (grouped, skipped) = group_invites(&rows);
    if skipped > 0 {
        ctx.warn(format!("Skipped {} rows with missing required fields", skipped));
        report.skipped += skipped;
    }

    for (tenant_id, users) in &grouped {
        let users_payload: Vec<Value> = users
            .iter()
            .map(|(email, (name, role_ids))| {
                json!({
                    "email": email,
                    "name": name,
                    "skipInviteEmail": true,
                    "roleIds": role_ids.iter().collect::<Vec<_>>(),
                    "verified": true,
                })
            })
            .collect();

        info!("Inviting {} users for tenant {}", users_payload.len(), tenant_id);
        match api::bulk_invite_impl(ctx.destination, tenant_id, &users_payload).await {
            Ok(outcome) => {
                if let Some(job_id) = outcome.job_id {
                    info!("Bulk invite queued for tenant {} (job ID {})", tenant_id, job_id);
                }
                report.created += outcome.invited;
            }
            Err(e) => {
                ctx.emit(MigrationEvent::Error {
                    message: format!("Error inviting users for tenant {}: {}", tenant_id, e),
                });
                report.failed += users.len();
            }
        }
    }

    info!("Bulk invite process completed");
    report.log_summary("Bulk invite");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tenant: &str, email: &str, role: &str, name: &str) -> InviteRow {
        InviteRow {
            tenant_id: tenant.to_string(),
            email: email.to_string(),
            role_id: role.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_group_invites_dedups_roles_per_user() {
        let rows = vec![
            row("t-1", "ada@example.com", "r-1", "Ada"),
            row("t-1", "ada@example.com", "r-2", "Ada"),
            row("t-1", "ada@example.com", "r-1", "Ada"),
            row("t-1", "grace@example.com", "r-1", "Grace"),
            row("t-2", "ada@example.com", "r-3", "Ada"),
        ];
        let (grouped, skipped) = group_invites(&rows);
        assert_eq!(skipped, 0);
        assert_eq!(grouped.len(), 2);

        let tenant_one = &grouped["t-1"];
        assert_eq!(tenant_one.len(), 2);
        let (name, roles) = &tenant_one["ada@example.com"];
        assert_eq!(name, "Ada");
        assert_eq!(roles.len(), 2);

        assert_eq!(grouped["t-2"]["ada@example.com"].1.len(), 1);
    }

    #[test]
    fn test_group_invites_drops_incomplete_rows() {
        let rows = vec![
            row("", "ada@example.com", "r-1", "Ada"),
            row("t-1", "", "r-1", "Ada"),
            row("t-1", "ada@example.com", "", "Ada"),
            row("t-1", "ada@example.com", "r-1", "Ada"),
        ];
        let (grouped, skipped) = group_invites(&rows);
        assert_eq!(skipped, 3);
        assert_eq!(grouped.len(), 1);
    }
}
