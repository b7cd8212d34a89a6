//! Allowed origins and OAuth redirect URIs.
//!
//! Origins are merged into the destination vendor record rather than
//! replaced: the destination keeps its own region's origins and gains the
//! source's. Redirect URIs are added individually when missing.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::vendor as api;
use crate::services::errors::MigrationResult;

pub struct AllowedOriginsStep;

#[async_trait]
impl super::MigrationStep for AllowedOriginsStep {
    fn kind(&self) -> StepKind {
        StepKind::AllowedOrigins
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        let mut report = StepReport::new();
        migrate_allowed_origins(ctx, &mut report).await?;
        migrate_redirect_uris(ctx, &mut report).await?;
        report.log_summary("Allowed origins migration");
        Ok(report)
    }
}

fn string_array(value: &Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Merge source origins into the destination list, keeping destination
/// order and appending new source origins. Returns the merged list and
/// how many were new.
fn merge_origins(source_origins: &[String], dest_origins: &[String]) -> (Vec<String>, usize) {
    let mut merged: Vec<String> = dest_origins.to_vec();
    let mut added = 0;
    for origin in source_origins {
        if !merged.contains(origin) {
            merged.push(origin.clone());
            added += 1;
        }
    }
    (merged, added)
}

/// Redirect URIs arrive as plain strings or objects carrying a
/// `redirectUri`/`uri` field.
fn normalize_uri(uri: &Value) -> String {
    match uri {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("redirectUri")
            .or_else(|| obj.get("uri"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uri.to_string()),
        other => other.to_string(),
    }
}

async fn migrate_allowed_origins(
    ctx: &MigrationContext<'_>,
    report: &mut StepReport,
) -> MigrationResult<()> {
    info!("Migrating allowed origins");

    info!("Fetching allowed origins from source account...");
    let source_vendor = api::get_vendor_impl(ctx.source).await?;
    let source_origins = string_array(&source_vendor, "allowedOrigins");
    if source_origins.is_empty() {
        ctx.warn("No allowed origins found in source account");
        return Ok(());
    }
    report.fetched += source_origins.len();
    info!("Found {} allowed origin(s)", source_origins.len());
    for origin in source_origins.iter().take(5) {
        debug!("  - {}", origin);
    }
    if source_origins.len() > 5 {
        debug!("  ... and {} more", source_origins.len() - 5);
    }

    info!("Fetching allowed origins from destination account...");
    let dest_vendor = api::get_vendor_impl(ctx.destination).await?;
    let dest_origins = string_array(&dest_vendor, "allowedOrigins");
    info!("Found {} existing allowed origin(s)", dest_origins.len());

    let (merged, added) = merge_origins(&source_origins, &dest_origins);
    if added == 0 {
        info!("Allowed origins already up to date");
        report.skipped += source_origins.len();
        return Ok(());
    }

    info!(
        "Adding {} new allowed origin(s), total after merge: {}",
        added,
        merged.len()
    );
    match api::update_allowed_origins_impl(ctx.destination, &merged).await {
        Ok(()) => {
            info!("Successfully updated allowed origins ({} new)", added);
            report.updated += added;
        }
        Err(e) => {
            ctx.emit(MigrationEvent::Error {
                message: format!("Failed to update allowed origins: {}", e),
            });
            report.failed += 1;
        }
    }
    Ok(())
}

async fn migrate_redirect_uris(
    ctx: &MigrationContext<'_>,
    report: &mut StepReport,
) -> MigrationResult<()> {
    info!("Migrating redirect URIs");

    info!("Fetching redirect URIs from source account...");
    let source_uris = api::get_redirect_uris_impl(ctx.source).await?;
    if source_uris.is_empty() {
        ctx.warn("No redirect URIs found in source account");
        return Ok(());
    }
    report.fetched += source_uris.len();
    info!("Found {} redirect URI(s)", source_uris.len());

    info!("Fetching redirect URIs from destination account...");
    let dest_uris = api::get_redirect_uris_impl(ctx.destination).await?;
    info!("Found {} existing redirect URI(s)", dest_uris.len());

    let dest_normalized: Vec<String> = dest_uris.iter().map(normalize_uri).collect();
    let missing: Vec<String> = source_uris
        .iter()
        .map(normalize_uri)
        .filter(|uri| !dest_normalized.contains(uri))
        .collect();

    if missing.is_empty() {
        info!("Redirect URIs already up to date");
        report.skipped += source_uris.len();
        return Ok(());
    }

    info!("Adding {} missing redirect URI(s)...", missing.len());
    for uri in &missing {
        match api::add_redirect_uri_impl(ctx.destination, uri).await {
            Ok(()) => {
                debug!("Added: {}", uri);
                report.created += 1;
            }
            Err(e) => {
                debug!("Failed: {} - {}", uri, e);
                report.failed += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_origins_appends_only_new() {
        let source = vec![
            "https://app.example.com".to_string(),
            "https://admin.example.com".to_string(),
        ];
        let dest = vec!["https://app.example.com".to_string()];
        let (merged, added) = merge_origins(&source, &dest);
        assert_eq!(added, 1);
        assert_eq!(
            merged,
            vec![
                "https://app.example.com".to_string(),
                "https://admin.example.com".to_string(),
            ]
        );
    }

    #[test]
    fn test_merge_origins_no_change() {
        let source = vec!["https://app.example.com".to_string()];
        let dest = source.clone();
        let (merged, added) = merge_origins(&source, &dest);
        assert_eq!(added, 0);
        assert_eq!(merged, dest);
    }

    #[test]
    fn test_normalize_uri_forms() {
        assert_eq!(
            normalize_uri(&json!("https://a.example.com/cb")),
            "https://a.example.com/cb"
        );
        assert_eq!(
            normalize_uri(&json!({ "redirectUri": "https://b.example.com/cb" })),
            "https://b.example.com/cb"
        );
        assert_eq!(
            normalize_uri(&json!({ "uri": "https://c.example.com/cb" })),
            "https://c.example.com/cb"
        );
    }
}
