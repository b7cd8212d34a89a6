//! Email template and sender-provider operations.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::services::client::errors::ClientResult;
use crate::services::client::VendorClient;

pub const VENDOR_HEADER: &str = "frontegg-vendor-id";

/// Template types the platform is known to serve, used when the bulk
/// listing endpoint is unavailable.
pub const EMAIL_TEMPLATE_TYPES: &[&str] = &[
    "ActivateUser",
    "ResetPassword",
    "MagicLink",
    "MagicCode",
    "ConnectOtpAuthenticator",
    "EnrollMfaAuthenticator",
    "UserInvitation",
    "PwlessInvitation",
    "ResetPhoneNumber",
    "VerifyEmail",
    "VerifyPhoneNumber",
    "ResetMfa",
    "RemoveUser",
    "BulkInviteTemplate",
    "NewDeviceConnected",
    "UserUsedInvitation",
    "EmailVerification",
];

const TEMPLATES_PATH: &str = "/identity/resources/mail/v1/configs/templates";

/// Fetch all email templates keyed by template type. Tries the bulk
/// listing first and falls back to fetching each known type.
#[instrument(skip(client), err)]
pub async fn get_email_templates_impl(
    client: &VendorClient,
) -> ClientResult<HashMap<String, Value>> {
    let mut templates = HashMap::new();

    match client.request_json(Method::GET, TEMPLATES_PATH, &[], None).await {
        Ok(Value::Array(all_templates)) => {
            for template in all_templates {
                if let Some(template_type) = template.get("type").and_then(|t| t.as_str()) {
                    debug!("Retrieved {} template", template_type);
                    templates.insert(template_type.to_string(), template);
                }
            }
            return Ok(templates);
        }
        Ok(_) => debug!("Bulk template listing returned unexpected shape, trying individually"),
        Err(e) => debug!("Bulk template fetch failed, trying individual templates: {}", e),
    }

    for template_type in EMAIL_TEMPLATE_TYPES {
        let path = format!("{}/{}", TEMPLATES_PATH, template_type);
        match client.request_json(Method::GET, &path, &[], None).await {
            Ok(template) if !template.is_null() => {
                debug!("Retrieved {} template", template_type);
                templates.insert(template_type.to_string(), template);
            }
            Ok(_) => debug!("Template {} returned no content", template_type),
            Err(e) if e.is_not_found() => debug!("Template {} not found", template_type),
            Err(e) => debug!("Failed to get {}: {}", template_type, e),
        }
    }

    Ok(templates)
}

/// Upsert one email template.
#[instrument(skip(client, template), err)]
pub async fn update_email_template_impl(
    client: &VendorClient,
    template: &Value,
) -> ClientResult<()> {
    let vendor_id = client.client_id.clone();
    client
        .request_json(
            Method::POST,
            TEMPLATES_PATH,
            &[(VENDOR_HEADER, vendor_id.as_str())],
            Some(template),
        )
        .await
        .map(|_| ())
}

/// Fetch the email sender-provider configuration, if one is set.
#[instrument(skip(client), err)]
pub async fn get_email_provider_impl(client: &VendorClient) -> ClientResult<Option<Value>> {
    let response = client
        .request_json(
            Method::GET,
            "/identity/resources/mail/v1/configurations",
            &[],
            None,
        )
        .await?;
    Ok(response.is_object().then_some(response))
}

/// Configure the email sender provider. The v1 endpoint is tried first;
/// 403/404 fall back to v2.
#[instrument(skip(client, secret), err)]
pub async fn set_email_provider_impl(
    client: &VendorClient,
    provider: &str,
    secret: &str,
) -> ClientResult<()> {
    let request_body = json!({
        "provider": provider,
        "secret": secret,
    });
    let vendor_id = client.client_id.clone();
    let headers = [(VENDOR_HEADER, vendor_id.as_str())];

    match client
        .request_json(
            Method::POST,
            "/identity/resources/mail/v1/configurations",
            &headers,
            Some(&request_body),
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.status(), Some(403) | Some(404)) => {
            debug!("v1 configurations endpoint failed ({}), trying v2", e);
            client
                .request_json(
                    Method::POST,
                    "/identity/resources/mail/v2/configurations",
                    &headers,
                    Some(&request_body),
                )
                .await
                .map(|_| ())
        }
        Err(e) => Err(e),
    }
}
