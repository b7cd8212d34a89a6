//! Security engine policy operations.

use reqwest::Method;
use serde_json::Value;
use tracing::instrument;

use crate::services::client::errors::ClientResult;
use crate::services::client::VendorClient;

/// The engine policies the platform exposes, as (slug, display name).
pub const SECURITY_RULES: &[(&str, &str)] = &[
    ("bot-detection", "Bot Detection"),
    ("device-fingerprint", "Device Fingerprint"),
    ("brute-force", "Brute Force Protection"),
    ("breached-password", "Breached Password"),
    ("impossible-travel", "Impossible Travel"),
    ("suspicious-ip", "Suspicious IPs"),
    ("stale-users", "Stale Users"),
    ("email-reputation", "Email Credibility Check"),
];

/// Display name of a rule slug.
pub fn rule_name(rule_type: &str) -> &str {
    SECURITY_RULES
        .iter()
        .find(|(slug, _)| *slug == rule_type)
        .map(|(_, name)| *name)
        .unwrap_or(rule_type)
}

/// Fetch one policy configuration.
#[instrument(skip(client), err)]
pub async fn get_security_rule_impl(
    client: &VendorClient,
    rule_type: &str,
) -> ClientResult<Value> {
    let path = format!("/security-engines/resources/policies/v1/{}", rule_type);
    client.request_json(Method::GET, &path, &[], None).await
}

/// Push a policy configuration. The platform may answer with an empty
/// body, which counts as success.
#[instrument(skip(client, config), err)]
pub async fn update_security_rule_impl(
    client: &VendorClient,
    rule_type: &str,
    config: &Value,
) -> ClientResult<()> {
    let path = format!("/security-engines/resources/policies/v1/{}", rule_type);
    client
        .request_json(Method::POST, &path, &[], Some(config))
        .await
        .map(|_| ())
}
