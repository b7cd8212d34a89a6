//! Permission category, permission and role operations.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::services::client::errors::{ClientError, ClientResult};
use crate::services::client::VendorClient;

pub const TENANT_HEADER: &str = "frontegg-tenant-id";

/// Maximum permissions per batch-create request.
pub const PERMISSION_BATCH_SIZE: usize = 100;

/// Fetch all permission categories.
#[instrument(skip(client), err)]
pub async fn get_categories_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let response = client
        .request_json(
            Method::GET,
            "/identity/resources/permissions/v1/categories",
            &[],
            None,
        )
        .await?;
    let categories = response.as_array().cloned().unwrap_or_default();
    info!("Retrieved {} categories", categories.len());
    Ok(categories)
}

/// Create one category and return the new destination id.
#[instrument(skip(client), err)]
pub async fn create_category_impl(
    client: &VendorClient,
    name: &str,
    description: &str,
) -> ClientResult<String> {
    let request_body = json!({
        "name": name,
        "description": description,
    });
    let created = client
        .request_json(
            Method::POST,
            "/identity/resources/permissions/v1/categories",
            &[],
            Some(&request_body),
        )
        .await?;
    created
        .get("id")
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
        .ok_or_else(|| ClientError::InvalidResponse {
            expected: "created category with id".to_string(),
            got: created.to_string(),
        })
}

/// Fetch all permissions.
#[instrument(skip(client), err)]
pub async fn get_permissions_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let response = client
        .request_json(Method::GET, "/identity/resources/permissions/v1", &[], None)
        .await?;
    let permissions = response.as_array().cloned().unwrap_or_default();
    info!("Retrieved {} permissions", permissions.len());
    Ok(permissions)
}

/// Create a batch of permissions. Callers chunk to
/// [`PERMISSION_BATCH_SIZE`] and pre-filter entries missing `key` or
/// `categoryId`.
#[instrument(skip(client, permissions), err)]
pub async fn create_permissions_batch_impl(
    client: &VendorClient,
    permissions: &[Value],
) -> ClientResult<()> {
    debug!("Creating batch of {} permissions", permissions.len());
    let request_body = Value::Array(permissions.to_vec());
    client
        .request_json(
            Method::POST,
            "/identity/resources/permissions/v1",
            &[],
            Some(&request_body),
        )
        .await
        .map(|_| ())
}

/// Delete a permission by id.
#[instrument(skip(client), err)]
pub async fn delete_permission_impl(client: &VendorClient, permission_id: &str) -> ClientResult<()> {
    let path = format!("/identity/resources/permissions/v1/{}", permission_id);
    client.delete(&path, &[]).await
}

/// Fetch all roles via the v2 endpoint.
#[instrument(skip(client), err)]
pub async fn get_roles_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let page = client
        .request_json(
            Method::GET,
            "/identity/resources/roles/v2?_limit=2000",
            &[],
            None,
        )
        .await?;
    let roles = page
        .get("items")
        .and_then(|i| i.as_array())
        .cloned()
        .unwrap_or_default();
    info!("Retrieved {} roles from the v2 endpoint", roles.len());
    Ok(roles)
}

/// Batch-create account-wide roles (no tenant scope). Returns the created
/// role records in request order.
#[instrument(skip(client, roles), err)]
pub async fn create_roles_batch_impl(
    client: &VendorClient,
    roles: &[Value],
) -> ClientResult<Vec<Value>> {
    debug!("Creating batch of {} account-wide roles", roles.len());
    let request_body = Value::Array(roles.to_vec());
    let created = client
        .request_json(
            Method::POST,
            "/identity/resources/roles/v1",
            &[],
            Some(&request_body),
        )
        .await?;
    Ok(created.as_array().cloned().unwrap_or_default())
}

/// Create one tenant-scoped role under its tenant header.
#[instrument(skip(client, role), err)]
pub async fn create_tenant_role_impl(
    client: &VendorClient,
    role: &Value,
    tenant_id: &str,
) -> ClientResult<Vec<Value>> {
    let request_body = Value::Array(vec![role.clone()]);
    let created = client
        .request_json(
            Method::POST,
            "/identity/resources/roles/v1",
            &[(TENANT_HEADER, tenant_id)],
            Some(&request_body),
        )
        .await?;
    Ok(created.as_array().cloned().unwrap_or_default())
}

/// Attach permissions to a role, optionally under a tenant scope.
#[instrument(skip(client, permission_ids), err)]
pub async fn set_role_permissions_impl(
    client: &VendorClient,
    role_id: &str,
    permission_ids: &[String],
    tenant_id: Option<&str>,
) -> ClientResult<()> {
    let path = format!("/identity/resources/roles/v1/{}/permissions", role_id);
    let request_body = json!({ "permissionIds": permission_ids });
    let headers: Vec<(&str, &str)> = match tenant_id {
        Some(tenant) => vec![(TENANT_HEADER, tenant)],
        None => Vec::new(),
    };
    client
        .request_json(Method::PUT, &path, &headers, Some(&request_body))
        .await
        .map(|_| ())
}

/// Delete a role by id.
#[instrument(skip(client), err)]
pub async fn delete_role_impl(client: &VendorClient, role_id: &str) -> ClientResult<()> {
    let path = format!("/identity/resources/roles/v1/{}", role_id);
    client.delete(&path, &[]).await
}
