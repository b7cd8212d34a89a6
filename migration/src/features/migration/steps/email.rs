//! Email configuration migration: templates and the sender provider.
//!
//! Template content follows the source, but redirect URLs stay whatever
//! the destination already has — they point at the destination region's
//! frontends.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::features::migration::progress::MigrationEvent;
use crate::features::migration::types::{MigrationContext, StepKind, StepReport};
use crate::services::client::api::mail as api;
use crate::services::errors::MigrationResult;

pub struct EmailConfigurationStep;

#[async_trait]
impl super::MigrationStep for EmailConfigurationStep {
    fn kind(&self) -> StepKind {
        StepKind::EmailConfiguration
    }

    async fn run(&self, ctx: &mut MigrationContext<'_>) -> MigrationResult<StepReport> {
        let mut report = StepReport::new();
        info!("Starting email configuration migration");
        let flags = ctx.config.migration.clone();

        if flags.email_templates {
            migrate_email_templates(ctx, &mut report).await?;
        }
        if flags.email_sender {
            migrate_email_provider(ctx, &mut report).await?;
        }

        report.log_summary("Email configuration migration");
        Ok(report)
    }
}

/// Content fields that follow the source account.
const COMPARED_FIELDS: &[&str] = &["htmlTemplate", "subject", "fromName", "active", "senderEmail"];

/// URL fields that stay with the destination account.
const PRESERVED_URL_FIELDS: &[&str] = &[
    "redirectURL",
    "successRedirectUrl",
    "redirectURLPattern",
    "successRedirectUrlPattern",
];

/// True when the destination template differs from the source on any
/// content field and needs an update.
fn templates_differ(source_template: &Value, dest_template: &Value) -> bool {
    COMPARED_FIELDS
        .iter()
        .any(|field| source_template.get(*field) != dest_template.get(*field))
}

/// Build the upsert payload: source content, destination URLs.
fn template_update_payload(
    template_type: &str,
    source_template: &Value,
    dest_template: Option<&Value>,
) -> Value {
    let mut payload = json!({
        "type": template_type,
        "htmlTemplate": source_template.get("htmlTemplate").and_then(|v| v.as_str()).unwrap_or_default(),
        "subject": source_template.get("subject").and_then(|v| v.as_str()).unwrap_or_default(),
        "fromName": source_template.get("fromName").and_then(|v| v.as_str()).unwrap_or_default(),
        "active": source_template.get("active").and_then(|v| v.as_bool()).unwrap_or(true),
        "senderEmail": source_template.get("senderEmail").and_then(|v| v.as_str()).unwrap_or_default(),
    });

    if let Some(dest_template) = dest_template {
        for field in PRESERVED_URL_FIELDS {
            if let Some(url) = dest_template.get(*field).filter(|v| !v.is_null()) {
                payload[*field] = url.clone();
            }
        }
    }
    payload
}

async fn migrate_email_templates(
    ctx: &MigrationContext<'_>,
    report: &mut StepReport,
) -> MigrationResult<()> {
    info!("Migrating email templates");

    info!("Fetching email templates from source account...");
    let source_templates = api::get_email_templates_impl(ctx.source).await?;
    info!("Fetching email templates from destination account...");
    let dest_templates = api::get_email_templates_impl(ctx.destination).await?;

    if source_templates.is_empty() {
        ctx.warn("No email templates found in source account");
        return Ok(());
    }
    report.fetched += source_templates.len();

    let (to_update, unchanged) = partition_templates(&source_templates, &dest_templates);
    info!("Templates to update: {}", to_update.len());
    info!("Templates unchanged: {}", unchanged);
    report.skipped += unchanged;

    for template_type in to_update {
        let source_template = &source_templates[&template_type];
        let payload = template_update_payload(
            &template_type,
            source_template,
            dest_templates.get(&template_type),
        );
        match api::update_email_template_impl(ctx.destination, &payload).await {
            Ok(()) => {
                debug!("Updated {} template", template_type);
                report.updated += 1;
            }
            Err(e) => {
                ctx.emit(MigrationEvent::Error {
                    message: format!("Failed to update {}: {}", template_type, e),
                });
                report.failed += 1;
            }
        }
    }
    Ok(())
}

/// Sort source templates into (needs update, unchanged count). Sorted for
/// a deterministic update order.
fn partition_templates(
    source_templates: &HashMap<String, Value>,
    dest_templates: &HashMap<String, Value>,
) -> (Vec<String>, usize) {
    let mut to_update = Vec::new();
    let mut unchanged = 0;
    let mut types: Vec<&String> = source_templates.keys().collect();
    types.sort();

    for template_type in types {
        match dest_templates.get(template_type) {
            Some(dest_template) => {
                if templates_differ(&source_templates[template_type], dest_template) {
                    to_update.push(template_type.clone());
                } else {
                    unchanged += 1;
                }
            }
            None => to_update.push(template_type.clone()),
        }
    }
    (to_update, unchanged)
}

async fn migrate_email_provider(
    ctx: &MigrationContext<'_>,
    report: &mut StepReport,
) -> MigrationResult<()> {
    info!("Migrating email provider configuration");

    info!("Fetching email provider from source account...");
    let Some(source_provider) = api::get_email_provider_impl(ctx.source).await? else {
        ctx.warn("No email provider configured in source account");
        return Ok(());
    };

    let provider = source_provider.get("provider").and_then(|v| v.as_str());
    let secret = source_provider.get("secret").and_then(|v| v.as_str());
    let (Some(provider), Some(secret)) = (provider, secret) else {
        ctx.warn("Invalid provider configuration in source account");
        return Ok(());
    };
    report.fetched += 1;
    info!("Found {} provider in source account", provider);

    if let Some(dest_provider) = api::get_email_provider_impl(ctx.destination).await? {
        let same_provider = dest_provider.get("provider").and_then(|v| v.as_str()) == Some(provider);
        let same_secret = dest_provider.get("secret").and_then(|v| v.as_str()) == Some(secret);
        if same_provider && same_secret {
            info!("Email provider already configured correctly in destination");
            report.skipped += 1;
            return Ok(());
        }
    }

    info!("Configuring {} provider in destination account...", provider);
    match api::set_email_provider_impl(ctx.destination, provider, secret).await {
        Ok(()) => {
            info!("Successfully configured {} email provider", provider);
            report.updated += 1;
        }
        Err(e) => {
            ctx.emit(MigrationEvent::Error {
                message: format!("Failed to configure email provider: {}", e),
            });
            report.failed += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(subject: &str, html: &str) -> Value {
        json!({
            "htmlTemplate": html,
            "subject": subject,
            "fromName": "Support",
            "active": true,
            "senderEmail": "noreply@example.com",
            "redirectURL": "https://dest.example.com/activate",
        })
    }

    #[test]
    fn test_templates_differ_on_content_fields() {
        let source = template("Welcome!", "<p>hi</p>");
        let same = template("Welcome!", "<p>hi</p>");
        assert!(!templates_differ(&source, &same));

        let new_subject = template("Hello!", "<p>hi</p>");
        assert!(templates_differ(&source, &new_subject));
    }

    #[test]
    fn test_url_changes_do_not_trigger_updates() {
        let source = template("Welcome!", "<p>hi</p>");
        let mut dest = template("Welcome!", "<p>hi</p>");
        dest["redirectURL"] = json!("https://other-region.example.com/activate");
        assert!(!templates_differ(&source, &dest));
    }

    #[test]
    fn test_update_payload_preserves_destination_urls() {
        let mut source = template("Welcome!", "<p>hi</p>");
        source["redirectURL"] = json!("https://source.example.com/activate");
        let mut dest = template("Old", "<p>old</p>");
        dest["redirectURL"] = json!("https://dest.example.com/activate");
        dest["successRedirectUrl"] = json!("https://dest.example.com/done");

        let payload = template_update_payload("ActivateUser", &source, Some(&dest));
        assert_eq!(payload["type"], "ActivateUser");
        assert_eq!(payload["subject"], "Welcome!");
        assert_eq!(payload["redirectURL"], "https://dest.example.com/activate");
        assert_eq!(payload["successRedirectUrl"], "https://dest.example.com/done");
    }

    #[test]
    fn test_update_payload_for_new_template_has_no_urls() {
        let source = template("Welcome!", "<p>hi</p>");
        let payload = template_update_payload("MagicLink", &source, None);
        assert!(payload.get("redirectURL").is_none());
        assert_eq!(payload["active"], true);
    }

    #[test]
    fn test_partition_templates() {
        let mut source = HashMap::new();
        source.insert("ActivateUser".to_string(), template("A", "<p>a</p>"));
        source.insert("MagicLink".to_string(), template("B", "<p>b</p>"));
        source.insert("ResetPassword".to_string(), template("C", "<p>c</p>"));

        let mut dest = HashMap::new();
        dest.insert("ActivateUser".to_string(), template("A", "<p>a</p>"));
        dest.insert("MagicLink".to_string(), template("B-old", "<p>b</p>"));

        let (to_update, unchanged) = partition_templates(&source, &dest);
        assert_eq!(unchanged, 1);
        // MagicLink differs, ResetPassword is new; sorted order.
        assert_eq!(to_update, vec!["MagicLink".to_string(), "ResetPassword".to_string()]);
    }
}
