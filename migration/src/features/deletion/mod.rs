//! Deletion runner: wipes destination-account data per the deletion flag
//! set.
//!
//! Entity types are processed in reverse dependency order — applications
//! and hooks first, then users and roles, permissions, and finally
//! tenants — so no delete trips over a dependent entity that is still
//! present.

use serde_json::json;
use tracing::{error, info, warn};

use crate::features::migration::types::StepReport;
use crate::services::client::api::{applications, hooks, identity, tenants, users};
use crate::services::client::VendorClient;
use crate::services::config::DeletionFlags;
use crate::services::errors::MigrationResult;

/// Deletable entity types, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionKind {
    Applications,
    Prehooks,
    Users,
    Roles,
    Permissions,
    Tenants,
}

impl DeletionKind {
    pub const SEQUENCE: [DeletionKind; 6] = [
        DeletionKind::Applications,
        DeletionKind::Prehooks,
        DeletionKind::Users,
        DeletionKind::Roles,
        DeletionKind::Permissions,
        DeletionKind::Tenants,
    ];

    pub fn title(self) -> &'static str {
        match self {
            DeletionKind::Applications => "Deleting Applications",
            DeletionKind::Prehooks => "Deleting Prehooks",
            DeletionKind::Users => "Deleting Users",
            DeletionKind::Roles => "Deleting Roles",
            DeletionKind::Permissions => "Deleting Permissions",
            DeletionKind::Tenants => "Deleting Tenants",
        }
    }

    pub fn enabled(self, flags: &DeletionFlags) -> bool {
        match self {
            DeletionKind::Applications => flags.applications,
            DeletionKind::Prehooks => flags.prehooks,
            DeletionKind::Users => flags.users,
            DeletionKind::Roles => flags.roles,
            DeletionKind::Permissions => flags.permissions,
            DeletionKind::Tenants => flags.tenants,
        }
    }
}

/// The deletion types a flag set enables, in execution order.
pub fn deletion_plan(flags: &DeletionFlags) -> Vec<DeletionKind> {
    DeletionKind::SEQUENCE
        .iter()
        .copied()
        .filter(|kind| kind.enabled(flags))
        .collect()
}

/// Run every enabled deletion against the destination account. A type
/// whose listing call fails is recorded and the run continues.
pub async fn run(flags: &DeletionFlags, client: &VendorClient) -> Vec<(DeletionKind, StepReport)> {
    let mut reports = Vec::new();
    for kind in deletion_plan(flags) {
        info!("=== {} ===", kind.title());
        let outcome = match kind {
            DeletionKind::Applications => delete_applications(client).await,
            DeletionKind::Prehooks => delete_prehooks(client).await,
            DeletionKind::Users => delete_users(client).await,
            DeletionKind::Roles => delete_roles(client).await,
            DeletionKind::Permissions => delete_permissions(client).await,
            DeletionKind::Tenants => delete_tenants(client).await,
        };
        match outcome {
            Ok(report) => {
                report.log_summary(kind.title());
                reports.push((kind, report));
            }
            Err(e) => {
                error!("{} failed: {}", kind.title(), e);
                reports.push((
                    kind,
                    StepReport {
                        failed: 1,
                        ..StepReport::default()
                    },
                ));
            }
        }
    }
    reports
}

/// The platform refuses to delete the last (default) application, so a
/// throwaway application is created first, every original application is
/// deleted, and the throwaway is removed last.
async fn delete_applications(client: &VendorClient) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();

    info!("Step 1: Creating dummy application to enable full deletion...");
    let dummy = json!({
        "name": "Temporary Dummy App",
        "appURL": "https://dummy.example.com",
        "loginURL": "https://dummy.example.com/login",
        "accessType": "FREE_ACCESS",
        "isActive": true,
        "type": "web",
        "frontendStack": "react",
        "description": "Temporary app for deletion process",
    });
    let dummy_app = match applications::create_application_impl(client, &dummy).await {
        Ok(app) => Some(app),
        Err(e) => {
            warn!(
                "Could not create dummy app, some applications may not be deletable: {}",
                e
            );
            None
        }
    };
    let dummy_id: Option<String> = dummy_app
        .as_ref()
        .and_then(|app| app.get("id").and_then(|v| v.as_str()))
        .map(|id| id.to_string());

    info!("Step 2: Fetching all applications...");
    let all_applications = applications::get_applications_impl(client).await?;
    report.fetched = all_applications.len();
    if all_applications.is_empty() {
        info!("No applications found to delete.");
        return Ok(report);
    }

    info!("Step 3: Deleting original applications...");
    for app in &all_applications {
        let Some(app_id) = app.get("id").and_then(|v| v.as_str()) else {
            continue;
        };
        // The dummy goes last.
        if Some(app_id) == dummy_id.as_deref() {
            continue;
        }
        let name = app.get("name").and_then(|v| v.as_str()).unwrap_or("Unknown");
        if app.get("isDefault").and_then(|v| v.as_bool()).unwrap_or(false) {
            info!("Found default application: {}", name);
        }
        delete_one_application(client, app_id, name, &mut report).await;
    }

    if let Some(dummy_id) = dummy_id {
        info!("Step 4: Attempting to delete dummy application...");
        match applications::delete_application_impl(client, &dummy_id).await {
            Ok(()) => {
                info!("Successfully cleaned up dummy application");
                report.deleted += 1;
            }
            Err(_) => {
                info!("Dummy app remains (now default) - you may want to delete it manually");
            }
        }
    }

    info!(
        "Summary: Deleted {}/{} applications",
        report.deleted, report.fetched
    );
    Ok(report)
}

async fn delete_one_application(
    client: &VendorClient,
    app_id: &str,
    name: &str,
    report: &mut StepReport,
) {
    match applications::delete_application_impl(client, app_id).await {
        Ok(()) => {
            info!("Deleted application: {} (ID: {})", name, app_id);
            report.deleted += 1;
        }
        Err(e) if e.is_not_found() => {
            info!("Application {} not found (404), skipping...", name);
            report.skipped += 1;
        }
        Err(e) if e.status() == Some(400) => {
            warn!("Cannot delete {} - likely the default application (400)", name);
            report.failed += 1;
        }
        Err(e) => {
            error!("Failed to delete application {}: {}", name, e);
            report.failed += 1;
        }
    }
}

async fn delete_prehooks(client: &VendorClient) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    let prehooks = hooks::get_hooks_impl(client).await?;
    report.fetched = prehooks.len();
    if prehooks.is_empty() {
        info!("No prehooks found to delete.");
        return Ok(report);
    }

    for prehook in &prehooks {
        let Some(prehook_id) = prehook.get("id").and_then(|v| v.as_str()) else {
            continue;
        };
        let name = prehook
            .get("displayName")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown");
        match hooks::delete_hook_impl(client, prehook_id).await {
            Ok(()) => {
                info!("Deleted prehook: {} (ID: {})", name, prehook_id);
                report.deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                info!("Prehook {} not found (404), skipping...", name);
                report.skipped += 1;
            }
            Err(e) => {
                error!("Failed to delete prehook {}: {}", name, e);
                report.failed += 1;
            }
        }
    }
    info!("Summary: Deleted {}/{} prehooks", report.deleted, report.fetched);
    Ok(report)
}

async fn delete_users(client: &VendorClient) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    let all_users = users::list_all_users_v2_impl(client).await?;
    report.fetched = all_users.len();

    for user in &all_users {
        let Some(user_id) = user.get("id").and_then(|v| v.as_str()) else {
            continue;
        };
        match users::delete_user_impl(client, user_id).await {
            Ok(()) => {
                info!("Deleted user with ID: {}", user_id);
                report.deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                info!("User with ID {} not found (404), skipping...", user_id);
                report.skipped += 1;
            }
            Err(e) => {
                error!("Failed to delete user with ID {}: {}", user_id, e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

async fn delete_roles(client: &VendorClient) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    let roles = identity::get_roles_impl(client).await?;
    report.fetched = roles.len();

    for role in &roles {
        let Some(role_id) = role.get("id").and_then(|v| v.as_str()) else {
            continue;
        };
        match identity::delete_role_impl(client, role_id).await {
            Ok(()) => {
                info!("Deleted role with ID: {}", role_id);
                report.deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                info!("Role with ID {} not found (404), skipping...", role_id);
                report.skipped += 1;
            }
            Err(e) => {
                error!("Failed to delete role with ID {}: {}", role_id, e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

async fn delete_permissions(client: &VendorClient) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    let permissions = identity::get_permissions_impl(client).await?;
    report.fetched = permissions.len();

    for permission in &permissions {
        let Some(permission_id) = permission.get("id").and_then(|v| v.as_str()) else {
            continue;
        };
        match identity::delete_permission_impl(client, permission_id).await {
            Ok(()) => {
                info!("Deleted permission with ID: {}", permission_id);
                report.deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                info!(
                    "Permission with ID {} not found (404), skipping...",
                    permission_id
                );
                report.skipped += 1;
            }
            Err(e) => {
                error!("Failed to delete permission with ID {}: {}", permission_id, e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

async fn delete_tenants(client: &VendorClient) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    let all_tenants = tenants::get_tenants_impl(client).await?;
    report.fetched = all_tenants.len();

    for tenant in &all_tenants {
        let Some(tenant_id) = tenant.get("tenantId").and_then(|v| v.as_str()) else {
            continue;
        };
        match tenants::delete_tenant_impl(client, tenant_id).await {
            Ok(()) => {
                info!("Deleted tenant with ID: {}", tenant_id);
                report.deleted += 1;
            }
            Err(e) => {
                error!("Failed to delete tenant {}: {}", tenant_id, e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_plan_order_and_filtering() {
        let flags = DeletionFlags {
            tenants: true,
            users: true,
            applications: true,
            ..Default::default()
        };
        // Flags declared in any order still delete applications first and
        // tenants last.
        assert_eq!(
            deletion_plan(&flags),
            vec![
                DeletionKind::Applications,
                DeletionKind::Users,
                DeletionKind::Tenants
            ]
        );
    }

    #[test]
    fn test_empty_flags_delete_nothing() {
        assert!(deletion_plan(&DeletionFlags::default()).is_empty());
    }

    #[test]
    fn test_sequence_is_reverse_dependency_order() {
        let position = |kind: DeletionKind| {
            DeletionKind::SEQUENCE
                .iter()
                .position(|k| *k == kind)
                .unwrap()
        };
        // Dependents go before the entities they reference.
        assert!(position(DeletionKind::Users) < position(DeletionKind::Roles));
        assert!(position(DeletionKind::Roles) < position(DeletionKind::Permissions));
        assert!(position(DeletionKind::Users) < position(DeletionKind::Tenants));
    }
}
