//! User operations: lookups, bulk CSV migration, invites, role
//! assignment and deletion.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::services::client::errors::{ClientError, ClientResult};
use crate::services::client::types::BulkInviteOutcome;
use crate::services::client::VendorClient;

use super::identity::TENANT_HEADER;

pub const ENVIRONMENT_HEADER: &str = "frontegg-environment-id";

/// Look up a user id by email within a tenant.
#[instrument(skip(client), err)]
pub async fn find_user_id_by_email_impl(
    client: &VendorClient,
    email: &str,
    tenant_id: &str,
) -> ClientResult<Option<String>> {
    let path = format!("/identity/resources/users/v3?_email={}", email);
    let response = client
        .request_json(Method::GET, &path, &[(TENANT_HEADER, tenant_id)], None)
        .await?;
    let user_id = response
        .get("items")
        .and_then(|i| i.as_array())
        .and_then(|items| items.first())
        .and_then(|user| user.get("id"))
        .and_then(|id| id.as_str())
        .map(|id| id.to_string());
    Ok(user_id)
}

/// Fetch the role ids a user holds within a tenant.
#[instrument(skip(client), err)]
pub async fn get_user_role_ids_impl(
    client: &VendorClient,
    user_id: &str,
    tenant_id: &str,
) -> ClientResult<Vec<String>> {
    let path = format!("/identity/resources/users/v3/roles?ids={}", user_id);
    let response = client
        .request_json(Method::GET, &path, &[(TENANT_HEADER, tenant_id)], None)
        .await?;
    let role_ids = response
        .as_array()
        .and_then(|entries| entries.first())
        .and_then(|entry| entry.get("roleIds"))
        .and_then(|ids| ids.as_array())
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Ok(role_ids)
}

/// Fetch every user in the account, sub-tenants included, following the
/// paginated v3 endpoint.
#[instrument(skip(client), err)]
pub async fn list_all_users_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let users = client
        .get_paginated_items("/identity/resources/users/v3?includeSubTenants=true&_limit=200")
        .await?;
    info!("Retrieved {} users", users.len());
    Ok(users)
}

/// Fetch every user via the v2 endpoint (used by the deletion runner,
/// which needs tenant inclusion).
#[instrument(skip(client), err)]
pub async fn list_all_users_v2_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let users = client
        .get_paginated_items(
            "/identity/resources/users/v2?_limit=200&_includeSubTenants=true&_include=tenants",
        )
        .await?;
    info!("Retrieved {} users", users.len());
    Ok(users)
}

/// Submit a prepared CSV to the bulk local-user migration endpoint.
///
/// The multipart form carries the CSV file, a fields mapper tying CSV
/// columns to user fields, and a hashing config declaring the password
/// column as bcrypt hashes.
#[instrument(skip(client), err)]
pub async fn bulk_csv_migration_impl(client: &VendorClient, csv_path: &Path) -> ClientResult<()> {
    info!("Submitting bulk CSV user migration: {}", csv_path.display());

    let csv_bytes = std::fs::read(csv_path).map_err(|e| ClientError::InvalidResponse {
        expected: format!("readable CSV at {}", csv_path.display()),
        got: e.to_string(),
    })?;

    let fields_mapper = json!({
        "name": "name",
        "email": "email",
        "tenantId": "tenantId",
        "password": "passwordHash",
        "metadata": "metadata",
        "phoneNumber": "phoneNumber",
        "roleIds": "roleIds",
    })
    .to_string();
    let hashing_config = json!({ "passwordHashType": "bcrypt" }).to_string();

    let form = Form::new()
        .part(
            "csv",
            Part::bytes(csv_bytes)
                .file_name("final_data.csv")
                .mime_str("text/csv")?,
        )
        .part(
            "fieldsMapper",
            Part::text(fields_mapper).mime_str("application/json")?,
        )
        .part(
            "hashingConfig",
            Part::text(hashing_config).mime_str("application/json")?,
        );

    let url = format!(
        "{}/identity/resources/migrations/v1/local/bulk/csv",
        client.base_url
    );
    let token = client.bearer_token().await?;
    let response = client
        .http_client
        .post(&url)
        .bearer_auth(token)
        .header("accept", "application/json, text/plain, */*")
        .header(ENVIRONMENT_HEADER, client.client_id.clone())
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    debug!("Bulk migration response {}: {}", status, body);

    if status.is_success() {
        info!("Users created: {}", status);
        Ok(())
    } else {
        error!("Bulk CSV migration failed: {} - {}", status, body);
        Err(ClientError::Api {
            method: "POST".to_string(),
            path: "/identity/resources/migrations/v1/local/bulk/csv".to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

/// Invite a batch of users into one tenant. A 202 means the platform
/// queued the batch and answers with a job id.
#[instrument(skip(client, users), err)]
pub async fn bulk_invite_impl(
    client: &VendorClient,
    tenant_id: &str,
    users: &[Value],
) -> ClientResult<BulkInviteOutcome> {
    let request_body = json!({ "users": users });
    let response = client
        .request_json(
            Method::POST,
            "/identity/resources/users/bulk/v1/invite",
            &[(TENANT_HEADER, tenant_id)],
            Some(&request_body),
        )
        .await?;

    let job_id = response
        .get("id")
        .and_then(|id| id.as_str())
        .map(|id| id.to_string());
    if let Some(job) = &job_id {
        info!("Bulk invite accepted for tenant {} (job {})", tenant_id, job);
    } else {
        info!("Successfully invited users for tenant {}", tenant_id);
    }

    Ok(BulkInviteOutcome {
        tenant_id: tenant_id.to_string(),
        invited: users.len(),
        job_id,
    })
}

/// Assign roles to a user within a tenant.
#[instrument(skip(client, role_ids), err)]
pub async fn assign_user_roles_impl(
    client: &VendorClient,
    user_id: &str,
    tenant_id: &str,
    role_ids: &[String],
) -> ClientResult<()> {
    let path = format!("/identity/resources/users/v1/{}/roles", user_id);
    let request_body = json!({ "roleIds": role_ids });
    client
        .request_json(
            Method::POST,
            &path,
            &[(TENANT_HEADER, tenant_id)],
            Some(&request_body),
        )
        .await
        .map(|_| ())
}

/// Delete a user by id.
#[instrument(skip(client), err)]
pub async fn delete_user_impl(client: &VendorClient, user_id: &str) -> ClientResult<()> {
    let path = format!("/identity/resources/users/v1/{}", user_id);
    client.delete(&path, &[]).await
}
