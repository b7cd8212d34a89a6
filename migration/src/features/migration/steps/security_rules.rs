//! Security rules migration: copy each engine policy to the destination
//! when its modifiable fields differ.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::security::{self, SECURITY_RULES};
use crate::services::errors::MigrationResult;

pub struct SecurityRulesStep;

#[async_trait]
impl super::MigrationStep for SecurityRulesStep {
    fn kind(&self) -> StepKind {
        StepKind::SecurityRules
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_security_rules(ctx).await
    }
}

/// The fields an operator can change on a policy. Everything else is
/// platform-managed and ignored for comparison.
const COMPARED_FIELDS: &[&str] = &[
    "action",
    "enabled",
    "threshold",
    "timeWindow",
    "lockDuration",
    "challengeType",
];

/// True when both configurations agree on every modifiable field. A
/// missing side always counts as a difference.
fn rules_match(source_rule: &Value, dest_rule: Option<&Value>) -> bool {
    let Some(dest_rule) = dest_rule else {
        return false;
    };
    COMPARED_FIELDS.iter().all(|field| {
        match (source_rule.get(*field), dest_rule.get(*field)) {
            (None, None) => true,
            (source, dest) => source == dest,
        }
    })
}

async fn migrate_security_rules(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting security rules migration process");

    let mut source_rules: Vec<(&str, Value)> = Vec::new();
    for &(rule_type, rule_name) in SECURITY_RULES {
        match security::get_security_rule_impl(ctx.source, rule_type).await {
            Ok(config) if !config.is_null() => {
                report.fetched += 1;
                source_rules.push((rule_type, config));
            }
            Ok(_) => ctx.warn(format!("Could not fetch {} from source", rule_name)),
            Err(e) => ctx.warn(format!("Failed to fetch {}: {}", rule_name, e)),
        }
    }

    if source_rules.is_empty() {
        ctx.emit(MigrationEvent::Error {
            message: "No security rules found in source account".to_string(),
        });
        return Ok(report);
    }
    info!("Retrieved {} security rules from source", source_rules.len());

    for (rule_type, source_config) in &source_rules {
        let rule_name = security::rule_name(rule_type);
        let dest_config = match security::get_security_rule_impl(ctx.destination, rule_type).await {
            Ok(config) if !config.is_null() => Some(config),
            _ => None,
        };

        if rules_match(source_config, dest_config.as_ref()) {
            debug!("{} is already up to date", rule_name);
            report.skipped += 1;
            continue;
        }

        info!("Updating {}", rule_name);
        match security::update_security_rule_impl(ctx.destination, rule_type, source_config).await {
            Ok(()) => {
                info!("Updated {}", rule_name);
                report.updated += 1;
            }
            Err(e) => {
                ctx.emit(MigrationEvent::Error {
                    message: format!("Failed to update {}: {}", rule_name, e),
                });
                report.failed += 1;
            }
        }
    }

    report.log_summary("Security rules migration");
    if report.failed == 0 {
        info!("Security rules migration completed successfully!");
    } else {
        ctx.warn(format!(
            "Security rules migration completed with {} failures",
            report.failed
        ));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rules_match_on_modifiable_fields() {
        let source = json!({ "enabled": true, "action": "BLOCK", "threshold": 5 });
        let same = json!({ "enabled": true, "action": "BLOCK", "threshold": 5, "updatedAt": "yesterday" });
        assert!(rules_match(&source, Some(&same)));

        let different_action = json!({ "enabled": true, "action": "CHALLENGE", "threshold": 5 });
        assert!(!rules_match(&source, Some(&different_action)));

        let missing_threshold = json!({ "enabled": true, "action": "BLOCK" });
        assert!(!rules_match(&source, Some(&missing_threshold)));
    }

    #[test]
    fn test_missing_destination_needs_update() {
        let source = json!({ "enabled": true });
        assert!(!rules_match(&source, None));
    }

    #[test]
    fn test_platform_managed_fields_are_ignored() {
        let source = json!({ "enabled": false, "id": "src-id", "vendorId": "v-1" });
        let dest = json!({ "enabled": false, "id": "dst-id", "vendorId": "v-2" });
        assert!(rules_match(&source, Some(&dest)));
    }
}
