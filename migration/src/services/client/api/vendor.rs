//! Vendor-level settings: allowed origins and OAuth redirect URIs.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::instrument;

use crate::services::client::errors::ClientResult;
use crate::services::client::VendorClient;

const REDIRECT_URI_PATH: &str = "/oauth/resources/configurations/v1/redirect-uri";

/// Fetch the vendor record, which carries `allowedOrigins`.
#[instrument(skip(client), err)]
pub async fn get_vendor_impl(client: &VendorClient) -> ClientResult<Value> {
    client.request_json(Method::GET, "/vendors", &[], None).await
}

/// Replace the vendor's allowed origins list.
#[instrument(skip(client, allowed_origins), err)]
pub async fn update_allowed_origins_impl(
    client: &VendorClient,
    allowed_origins: &[String],
) -> ClientResult<()> {
    let request_body = json!({ "allowedOrigins": allowed_origins });
    client
        .request_json(Method::PUT, "/vendors", &[], Some(&request_body))
        .await
        .map(|_| ())
}

/// Fetch the configured OAuth redirect URIs. The endpoint answers either
/// an object wrapping a `redirectUris` array or a bare array.
#[instrument(skip(client), err)]
pub async fn get_redirect_uris_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let response = client
        .request_json(Method::GET, REDIRECT_URI_PATH, &[], None)
        .await?;
    let uris = match response {
        Value::Object(ref obj) => obj
            .get("redirectUris")
            .and_then(|u| u.as_array())
            .cloned()
            .unwrap_or_default(),
        Value::Array(uris) => uris,
        _ => Vec::new(),
    };
    Ok(uris)
}

/// Register a single redirect URI.
#[instrument(skip(client), err)]
pub async fn add_redirect_uri_impl(client: &VendorClient, redirect_uri: &str) -> ClientResult<()> {
    let request_body = json!({ "redirectUri": redirect_uri });
    client
        .request_json(Method::POST, REDIRECT_URI_PATH, &[], Some(&request_body))
        .await
        .map(|_| ())
}
