//! One module per migration step.
//!
//! Every step follows the same contract: fetch all entities of its type
//! from the source account, rewrite foreign-key-like fields through the
//! remap table, create the equivalents at the destination, and record new
//! source → destination id pairs. A failure on one entity is logged and
//! the step continues; a missing remap entry means the dependent entity
//! is skipped, never retried.

pub mod allowed_origins;
pub mod applications;
pub mod assign_roles;
pub mod bulk_invite;
pub mod email;
pub mod groups;
pub mod hooks;
pub mod jwt_settings;
pub mod roles;
pub mod security_rules;
pub mod settings;
pub mod tenants;
pub mod users;

use async_trait::async_trait;

use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::errors::MigrationResult;

/// A single migration step, executable against a run context.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    fn kind(&self) -> StepKind;
    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport>;
}

/// Resolve the step implementation for a step kind.
pub fn step_for(kind: StepKind) -> Box<dyn MigrationStep> {
    match kind {
        StepKind::Tenants => Box::new(tenants::TenantsStep),
        StepKind::Settings => Box::new(settings::SettingsStep),
        StepKind::Roles => Box::new(roles::RolesStep),
        StepKind::Users => Box::new(users::UsersStep),
        StepKind::BulkInvite => Box::new(bulk_invite::BulkInviteStep),
        StepKind::AssignRoles => Box::new(assign_roles::AssignRolesStep),
        StepKind::Groups => Box::new(groups::GroupsStep),
        StepKind::Applications => Box::new(applications::ApplicationsStep),
        StepKind::SecurityRules => Box::new(security_rules::SecurityRulesStep),
        StepKind::EmailConfiguration => Box::new(email::EmailConfigurationStep),
        StepKind::Prehooks => Box::new(hooks::PrehooksStep),
        StepKind::AllowedOrigins => Box::new(allowed_origins::AllowedOriginsStep),
        StepKind::JwtSettings => Box::new(jwt_settings::JwtSettingsStep),
    }
}
