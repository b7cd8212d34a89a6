//! Tenant operations.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::services::client::errors::{ClientError, ClientResult};
use crate::services::client::VendorClient;

/// Fetch all tenants of the account.
#[instrument(skip(client), err)]
pub async fn get_tenants_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let page = client
        .request_json(Method::GET, "/tenants/resources/tenants/v2", &[], None)
        .await?;
    let tenants = page
        .get("items")
        .and_then(|i| i.as_array())
        .cloned()
        .unwrap_or_default();
    info!("Retrieved {} tenants", tenants.len());
    Ok(tenants)
}

/// Create one tenant. Only `tenantId` and `name` are carried over; the
/// platform fills in the rest.
#[instrument(skip(client, tenant), err)]
pub async fn create_tenant_impl(client: &VendorClient, tenant: &Value) -> ClientResult<Value> {
    let tenant_id = tenant
        .get("tenantId")
        .and_then(|t| t.as_str())
        .ok_or_else(|| ClientError::InvalidResponse {
            expected: "tenant with tenantId".to_string(),
            got: "tenant record without tenantId".to_string(),
        })?;
    let request_body = json!({
        "tenantId": tenant_id,
        "name": tenant.get("name").and_then(|n| n.as_str()).unwrap_or_default(),
    });
    client
        .request_json(
            Method::POST,
            "/tenants/resources/tenants/v1",
            &[],
            Some(&request_body),
        )
        .await
}

/// Replace a tenant's metadata blob.
#[instrument(skip(client, metadata), err)]
pub async fn set_tenant_metadata_impl(
    client: &VendorClient,
    tenant_id: &str,
    metadata: &Value,
) -> ClientResult<()> {
    let path = format!("/tenants/resources/tenants/v1/{}/metadata", tenant_id);
    let request_body = json!({ "metadata": metadata });
    client
        .request_json(Method::POST, &path, &[], Some(&request_body))
        .await
        .map(|_| ())
}

/// Delete a tenant by id.
#[instrument(skip(client), err)]
pub async fn delete_tenant_impl(client: &VendorClient, tenant_id: &str) -> ClientResult<()> {
    let path = format!("/tenants/resources/tenants/v1/{}", tenant_id);
    client.delete(&path, &[]).await
}
