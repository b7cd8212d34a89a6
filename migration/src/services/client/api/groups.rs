//! Group operations, all tenant-scoped.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::services::client::errors::{ClientError, ClientResult};
use crate::services::client::VendorClient;

use super::identity::TENANT_HEADER;

/// Create a group under a tenant and return the new group id.
#[instrument(skip(client), err)]
pub async fn create_group_impl(
    client: &VendorClient,
    tenant_id: &str,
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
            "/identity/resources/groups/v1",
            &[(TENANT_HEADER, tenant_id)],
            Some(&request_body),
        )
        .await?;
    created
        .get("id")
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
        .ok_or_else(|| ClientError::InvalidResponse {
            expected: "created group with id".to_string(),
            got: created.to_string(),
        })
}

/// Add users to a group.
#[instrument(skip(client, user_ids), err)]
pub async fn add_group_members_impl(
    client: &VendorClient,
    tenant_id: &str,
    group_id: &str,
    user_ids: &[String],
) -> ClientResult<()> {
    let path = format!("/identity/resources/groups/v1/{}/users", group_id);
    let request_body = json!({ "userIds": user_ids });
    client
        .request_json(
            Method::POST,
            &path,
            &[(TENANT_HEADER, tenant_id)],
            Some(&request_body),
        )
        .await
        .map(|_| ())?;
    info!("Successfully assigned users to group ID: {}", group_id);
    Ok(())
}

/// Fetch the users of one tenant (first page of 200, which covers the
/// group-membership lookups this tool performs).
#[instrument(skip(client), err)]
pub async fn list_tenant_users_impl(
    client: &VendorClient,
    tenant_id: &str,
) -> ClientResult<Vec<Value>> {
    let response = client
        .request_json(
            Method::GET,
            "/identity/resources/users/v3?_limit=200",
            &[(TENANT_HEADER, tenant_id)],
            None,
        )
        .await?;
    Ok(response
        .get("items")
        .and_then(|i| i.as_array())
        .cloned()
        .unwrap_or_default())
}
