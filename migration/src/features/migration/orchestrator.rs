//! Migration orchestrator - builds the run plan from the flag set and
//! executes the enabled steps in their declared order.

use std::time::Instant;

use tracing::info;

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::steps::step_for;
use crate::features::migration::types::{MigrationContext, MigrationReport, StepKind};
use crate::services::config::MigrationFlags;

/// The ordered list of steps a run will execute, with warnings about
/// enabled steps whose prerequisite steps are disabled.
///
/// A missing prerequisite does not remove the step from the plan: the
/// destination may already hold the dependency from an earlier run, and
/// per-entity remap misses degrade to logged skips either way.
#[derive(Debug)]
pub struct MigrationPlan {
    pub steps: Vec<StepKind>,
    pub warnings: Vec<String>,
}

impl MigrationPlan {
    pub fn build(flags: &MigrationFlags) -> Self {
        let steps: Vec<StepKind> = StepKind::SEQUENCE
            .iter()
            .copied()
            .filter(|kind| kind.enabled(flags))
            .collect();

        let mut warnings = Vec::new();
        for step in &steps {
            for prerequisite in step.prerequisites(flags) {
                if !prerequisite.enabled(flags) {
                    warnings.push(format!(
                        "{} is enabled but its prerequisite {} is not; entities missing from the destination will be skipped",
                        step.title(),
                        prerequisite.title(),
                    ));
                }
            }
        }
        Self { steps, warnings }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Print the scheduled steps and any prerequisite warnings.
    pub fn log_scheduled_tasks(&self) {
        info!("Scheduled Migration Tasks:");
        for step in &self.steps {
            info!("  - {}", step.title());
        }
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
    }
}

/// Execute the plan sequentially. A step that fails outright (e.g. a
/// missing CSV export) is recorded and the run continues with the next
/// step; per-entity failures are already absorbed inside the steps.
pub async fn run(plan: &MigrationPlan, ctx: &mut MigrationContext<'_>) -> MigrationReport {
    ctx.emit(MigrationEvent::Started);
    let mut report = MigrationReport::default();

    for kind in &plan.steps {
        let step = step_for(*kind);
        ctx.emit(MigrationEvent::StepBegun {
            step: kind.title().to_string(),
        });
        let started = Instant::now();

        match step.run(ctx).await {
            Ok(step_report) => {
                ctx.emit(MigrationEvent::StepCompleted {
                    step: kind.title().to_string(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                report.steps.push((*kind, step_report));
            }
            Err(e) => {
                ctx.emit(MigrationEvent::Error {
                    message: format!("{} failed: {}", kind.title(), e),
                });
                report.failed_steps.push((*kind, e.to_string()));
            }
        }
    }

    ctx.emit(MigrationEvent::Completed {
        success: report.fully_successful(),
    });
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_flags_produce_no_steps() {
        let plan = MigrationPlan::build(&MigrationFlags::default());
        assert!(plan.is_empty());
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_plan_contains_only_enabled_steps_in_sequence_order() {
        let flags = MigrationFlags {
            jwt_settings: true,
            tenants: true,
            applications: true,
            ..Default::default()
        };
        let plan = MigrationPlan::build(&flags);
        assert_eq!(
            plan.steps,
            vec![
                StepKind::Tenants,
                StepKind::Applications,
                StepKind::JwtSettings
            ]
        );
    }

    #[test]
    fn test_missing_prerequisite_warns_but_keeps_the_step() {
        let flags = MigrationFlags {
            roles: true,
            ..Default::default()
        };
        let plan = MigrationPlan::build(&flags);
        assert_eq!(plan.steps, vec![StepKind::Roles]);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("Roles Migration"));
        assert!(plan.warnings[0].contains("Settings Migration"));
    }

    #[test]
    fn test_satisfied_prerequisites_do_not_warn() {
        let flags = MigrationFlags {
            tenants: true,
            categories: true,
            permissions: true,
            roles: true,
            users: true,
            user_roles: true,
            ..Default::default()
        };
        let plan = MigrationPlan::build(&flags);
        assert!(plan.warnings.is_empty());
        assert_eq!(plan.steps.first(), Some(&StepKind::Tenants));
        assert_eq!(plan.steps.last(), Some(&StepKind::Users));
    }

    #[test]
    fn test_users_without_role_migration_does_not_require_roles() {
        let flags = MigrationFlags {
            tenants: true,
            users: true,
            ..Default::default()
        };
        let plan = MigrationPlan::build(&flags);
        assert!(plan.warnings.is_empty());
    }
}
