//! JWT settings migration: token expirations and the cookie SameSite
//! policy.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::jwt as api;
use crate::services::errors::MigrationResult;

pub struct JwtSettingsStep;

#[async_trait]
impl super::MigrationStep for JwtSettingsStep {
    fn kind(&self) -> StepKind {
        StepKind::JwtSettings
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        migrate_jwt_settings(ctx).await
    }
}

/// True when any source setting is absent or different at the
/// destination.
fn jwt_settings_differ(
    source_settings: &Map<String, Value>,
    dest_settings: &Map<String, Value>,
) -> bool {
    source_settings
        .iter()
        .any(|(key, value)| dest_settings.get(key) != Some(value))
}

async fn migrate_jwt_settings(ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
    let mut report = StepReport::new();
    info!("Starting JWT settings migration");

    info!("Fetching JWT settings from source account...");
    let source_settings = api::get_jwt_settings_impl(ctx.source).await?;
    if source_settings.is_empty() {
        ctx.warn("No JWT settings found in source account");
        return Ok(report);
    }
    report.fetched = source_settings.len();
    info!("Found settings: {}", serde_json::Value::Object(source_settings.clone()));

    info!("Fetching JWT settings from destination account...");
    let dest_settings = api::get_jwt_settings_impl(ctx.destination).await?;

    if !jwt_settings_differ(&source_settings, &dest_settings) {
        info!("JWT settings are already up to date in destination");
        report.skipped = source_settings.len();
        return Ok(report);
    }

    info!("Updating JWT settings in destination account...");
    match api::update_jwt_settings_impl(ctx.destination, &source_settings).await {
        Ok(()) => {
            info!("Successfully migrated JWT settings");
            report.updated = source_settings.len();
        }
        Err(e) => {
            ctx.emit(MigrationEvent::Error {
                message: format!("Failed to migrate JWT settings: {}", e),
            });
            report.failed = source_settings.len();
        }
    }

    report.log_summary("JWT settings migration");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_settings_differ() {
        let source = settings(&[
            ("defaultTokenExpiration", json!(86400)),
            ("cookieSameSite", json!("none")),
        ]);
        let same = settings(&[
            ("defaultTokenExpiration", json!(86400)),
            ("cookieSameSite", json!("none")),
            ("defaultRefreshTokenExpiration", json!(2592000)),
        ]);
        // Extra destination keys do not force an update.
        assert!(!jwt_settings_differ(&source, &same));

        let different = settings(&[
            ("defaultTokenExpiration", json!(3600)),
            ("cookieSameSite", json!("none")),
        ]);
        assert!(jwt_settings_differ(&source, &different));

        // A key missing at the destination forces an update.
        let partial = settings(&[("cookieSameSite", json!("none"))]);
        assert!(jwt_settings_differ(&source, &partial));
    }
}
