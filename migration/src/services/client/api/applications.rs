//! Application operations.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::services::client::errors::ClientResult;
use crate::services::client::VendorClient;

/// Fetch all applications, excluding agent applications.
#[instrument(skip(client), err)]
pub async fn get_applications_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let response = client
        .request_json(
            Method::GET,
            "/applications/resources/applications/v1?_excludeAgents=true",
            &[],
            None,
        )
        .await?;
    let applications = response.as_array().cloned().unwrap_or_default();
    info!("Retrieved {} applications", applications.len());
    Ok(applications)
}

/// Fields copied verbatim into a creation or update payload.
fn application_body(app: &Value) -> Value {
    let mut body = json!({
        "name": app.get("name").and_then(|v| v.as_str()).unwrap_or_default(),
        "appURL": app.get("appURL").and_then(|v| v.as_str()).unwrap_or_default(),
        "loginURL": app.get("loginURL").and_then(|v| v.as_str()).unwrap_or_default(),
        "accessType": app.get("accessType").and_then(|v| v.as_str()).unwrap_or("FREE_ACCESS"),
        "isActive": app.get("isActive").and_then(|v| v.as_bool()).unwrap_or(true),
        "type": app.get("type").and_then(|v| v.as_str()).unwrap_or("WEB"),
        "frontendStack": app.get("frontendStack").and_then(|v| v.as_str()).unwrap_or("REACT"),
    });
    for optional in ["logoURL", "description", "metadata"] {
        if let Some(value) = app.get(optional).filter(|v| !v.is_null()) {
            body[optional] = value.clone();
        }
    }
    body
}

/// Create an application, preserving its default flag.
#[instrument(skip(client, app), err)]
pub async fn create_application_impl(client: &VendorClient, app: &Value) -> ClientResult<Value> {
    let mut request_body = application_body(app);
    request_body["isDefault"] = Value::Bool(
        app.get("isDefault")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    );
    client
        .request_json(
            Method::POST,
            "/applications/resources/applications/v1",
            &[],
            Some(&request_body),
        )
        .await
}

/// Update an existing application in place.
#[instrument(skip(client, app), err)]
pub async fn update_application_impl(
    client: &VendorClient,
    app_id: &str,
    app: &Value,
) -> ClientResult<Value> {
    let path = format!("/applications/resources/applications/v1/{}", app_id);
    let request_body = application_body(app);
    client
        .request_json(Method::PUT, &path, &[], Some(&request_body))
        .await
}

/// Delete an application by id.
#[instrument(skip(client), err)]
pub async fn delete_application_impl(client: &VendorClient, app_id: &str) -> ClientResult<()> {
    let path = format!("/applications/resources/applications/v1/{}", app_id);
    client.delete(&path, &[]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_body_copies_known_fields() {
        let app = json!({
            "id": "app-1",
            "name": "Portal",
            "appURL": "https://portal.example.com",
            "loginURL": "https://portal.example.com/login",
            "accessType": "MANAGED_ACCESS",
            "isActive": false,
            "type": "WEB",
            "frontendStack": "VUE",
            "description": "customer portal",
            "vendorId": "should-not-copy",
        });
        let body = application_body(&app);
        assert_eq!(body["name"], "Portal");
        assert_eq!(body["accessType"], "MANAGED_ACCESS");
        assert_eq!(body["isActive"], false);
        assert_eq!(body["frontendStack"], "VUE");
        assert_eq!(body["description"], "customer portal");
        assert!(body.get("vendorId").is_none());
        assert!(body.get("id").is_none());
    }

    #[test]
    fn test_application_body_defaults() {
        let body = application_body(&json!({ "name": "Bare" }));
        assert_eq!(body["accessType"], "FREE_ACCESS");
        assert_eq!(body["type"], "WEB");
        assert_eq!(body["frontendStack"], "REACT");
        assert_eq!(body["isActive"], true);
        assert!(body.get("logoURL").is_none());
    }
}
