//! Shared types for the migration feature: the step catalogue with its
//! declared ordering and prerequisites, per-step reports, and the run
//! context threaded through every step.

use std::fmt;

use crate::features::migration::progress::{
    CompositeEventHandler, LoggingEventHandler, MigrationEvent, MigrationEventHandler,
};
use crate::features::migration::remap::RemapTable;
use crate::services::client::VendorClient;
use crate::services::config::{Config, MigrationFlags};

/// Every migration step, in its fixed execution order.
///
/// The ordering and the prerequisite edges below are the explicit form of
/// the dependency chain between entity types: permissions before roles,
/// tenants and roles before users, users before group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Tenants,
    Settings,
    Roles,
    Users,
    BulkInvite,
    AssignRoles,
    Groups,
    Applications,
    SecurityRules,
    EmailConfiguration,
    Prehooks,
    AllowedOrigins,
    JwtSettings,
}

impl StepKind {
    /// The fixed execution sequence. Steps enabled by flags always run in
    /// this order, never in flag-declaration order.
    pub const SEQUENCE: [StepKind; 13] = [
        StepKind::Tenants,
        StepKind::Settings,
        StepKind::Roles,
        StepKind::Users,
        StepKind::BulkInvite,
        StepKind::AssignRoles,
        StepKind::Groups,
        StepKind::Applications,
        StepKind::SecurityRules,
        StepKind::EmailConfiguration,
        StepKind::Prehooks,
        StepKind::AllowedOrigins,
        StepKind::JwtSettings,
    ];

    pub fn title(self) -> &'static str {
        match self {
            StepKind::Tenants => "Tenant Migration",
            StepKind::Settings => "Settings Migration (Categories & Permissions)",
            StepKind::Roles => "Roles Migration",
            StepKind::Users => "Users Migration",
            StepKind::BulkInvite => "Bulk Invite Process",
            StepKind::AssignRoles => "Role Assignment Process",
            StepKind::Groups => "Groups Migration",
            StepKind::Applications => "Applications Migration",
            StepKind::SecurityRules => "Security Rules Migration",
            StepKind::EmailConfiguration => "Email Configuration Migration",
            StepKind::Prehooks => "Webhook Migration",
            StepKind::AllowedOrigins => "Allowed Origins Migration",
            StepKind::JwtSettings => "JWT Settings Migration",
        }
    }

    /// Steps whose output this step consumes through the remap table or
    /// the destination account. Flag-dependent: a Users run that does not
    /// migrate user roles does not depend on Roles.
    pub fn prerequisites(self, flags: &MigrationFlags) -> Vec<StepKind> {
        match self {
            StepKind::Roles => vec![StepKind::Settings],
            StepKind::Users => {
                let mut needs = vec![StepKind::Tenants];
                if flags.user_roles {
                    needs.push(StepKind::Roles);
                }
                needs
            }
            StepKind::BulkInvite => vec![StepKind::Tenants, StepKind::Roles],
            StepKind::AssignRoles => vec![StepKind::Users, StepKind::Roles],
            StepKind::Groups => vec![StepKind::Tenants, StepKind::Users],
            _ => Vec::new(),
        }
    }

    /// Whether the flag set enables this step at all.
    pub fn enabled(self, flags: &MigrationFlags) -> bool {
        match self {
            StepKind::Tenants => flags.tenants,
            StepKind::Settings => flags.categories || flags.permissions,
            StepKind::Roles => flags.roles,
            StepKind::Users => flags.users || flags.user_roles,
            StepKind::BulkInvite => flags.bulk_invite,
            StepKind::AssignRoles => flags.assign_roles,
            StepKind::Groups => flags.groups,
            StepKind::Applications => flags.applications,
            StepKind::SecurityRules => flags.security_rules,
            StepKind::EmailConfiguration => flags.email_templates || flags.email_sender,
            StepKind::Prehooks => flags.prehooks,
            StepKind::AllowedOrigins => flags.allowed_origins,
            StepKind::JwtSettings => flags.jwt_settings,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Per-step outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StepReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the counters as a summary block, the run's replacement for the
    /// old stats tables.
    pub fn log_summary(&self, title: &str) {
        tracing::info!(
            fetched = self.fetched,
            created = self.created,
            updated = self.updated,
            deleted = self.deleted,
            skipped = self.skipped,
            failed = self.failed,
            "{} summary",
            title
        );
    }
}

/// Whole-run outcome: one report per executed step plus any step-level
/// failures (a step that could not run at all, e.g. a missing CSV).
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub steps: Vec<(StepKind, StepReport)>,
    pub failed_steps: Vec<(StepKind, String)>,
}

impl MigrationReport {
    /// True when every step ran and no individual entity failed.
    pub fn fully_successful(&self) -> bool {
        self.failed_steps.is_empty() && self.steps.iter().all(|(_, r)| r.failed == 0)
    }

    pub fn total_failed_entities(&self) -> usize {
        self.steps.iter().map(|(_, r)| r.failed).sum()
    }
}

/// Everything a step needs: both clients, the run configuration, the
/// shared remap table and the event sink.
pub struct MigrationContext<'a> {
    pub source: &'a VendorClient,
    pub destination: &'a VendorClient,
    pub config: &'a Config,
    pub remap: RemapTable,
    pub events: CompositeEventHandler,
}

impl<'a> MigrationContext<'a> {
    pub fn new(source: &'a VendorClient, destination: &'a VendorClient, config: &'a Config) -> Self {
        let mut events = CompositeEventHandler::new();
        events.add_handler(LoggingEventHandler);
        Self {
            source,
            destination,
            config,
            remap: RemapTable::new(),
            events,
        }
    }

    pub fn emit(&self, event: MigrationEvent) {
        self.events.handle_event(event);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(MigrationEvent::Warning {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_covers_every_step_once() {
        for kind in StepKind::SEQUENCE {
            assert_eq!(
                StepKind::SEQUENCE.iter().filter(|k| **k == kind).count(),
                1
            );
        }
    }

    #[test]
    fn test_prerequisites_precede_their_step_in_sequence() {
        let flags = MigrationFlags {
            user_roles: true,
            ..Default::default()
        };
        let position = |kind: StepKind| {
            StepKind::SEQUENCE
                .iter()
                .position(|k| *k == kind)
                .expect("step in sequence")
        };
        for kind in StepKind::SEQUENCE {
            for prerequisite in kind.prerequisites(&flags) {
                assert!(
                    position(prerequisite) < position(kind),
                    "{:?} must come before {:?}",
                    prerequisite,
                    kind
                );
            }
        }
    }

    #[test]
    fn test_users_prerequisites_depend_on_user_roles_flag() {
        let without_roles = MigrationFlags {
            users: true,
            ..Default::default()
        };
        assert_eq!(
            StepKind::Users.prerequisites(&without_roles),
            vec![StepKind::Tenants]
        );

        let with_roles = MigrationFlags {
            users: true,
            user_roles: true,
            ..Default::default()
        };
        assert_eq!(
            StepKind::Users.prerequisites(&with_roles),
            vec![StepKind::Tenants, StepKind::Roles]
        );
    }

    #[test]
    fn test_combined_flag_steps() {
        let flags = MigrationFlags {
            categories: true,
            ..Default::default()
        };
        assert!(StepKind::Settings.enabled(&flags));

        let flags = MigrationFlags {
            permissions: true,
            ..Default::default()
        };
        assert!(StepKind::Settings.enabled(&flags));

        let flags = MigrationFlags {
            email_sender: true,
            ..Default::default()
        };
        assert!(StepKind::EmailConfiguration.enabled(&flags));
        assert!(!StepKind::Settings.enabled(&flags));
    }
}
