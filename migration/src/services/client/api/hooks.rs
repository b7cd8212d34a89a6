//! Prehook (webhook) configuration operations.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::services::client::errors::ClientResult;
use crate::services::client::types::HookCode;
use crate::services::client::VendorClient;

use super::users::ENVIRONMENT_HEADER;

const CONFIGURATIONS_PATH: &str = "/prehooks/resources/configurations/v1";

/// Fetch all hook configurations of the account.
#[instrument(skip(client), err)]
pub async fn get_hooks_impl(client: &VendorClient) -> ClientResult<Vec<Value>> {
    let environment_id = client.client_id.clone();
    let response = client
        .request_json(
            Method::GET,
            CONFIGURATIONS_PATH,
            &[(ENVIRONMENT_HEADER, environment_id.as_str())],
            None,
        )
        .await?;
    let hooks = response.as_array().cloned().unwrap_or_default();
    info!("Found {} webhook(s)", hooks.len());
    Ok(hooks)
}

/// Fetch the custom code behind a CUSTOM_CODE hook.
#[instrument(skip(client), err)]
pub async fn get_custom_code_impl(client: &VendorClient, code_id: &str) -> ClientResult<HookCode> {
    let environment_id = client.client_id.clone();
    let path = format!("/custom-code/resources/codes/v1/{}", code_id);
    let response = client
        .request_json(
            Method::GET,
            &path,
            &[(ENVIRONMENT_HEADER, environment_id.as_str())],
            None,
        )
        .await?;

    let content = response
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();
    let runtime = response
        .get("runtime")
        .and_then(|r| r.as_str())
        .unwrap_or("NODE_20")
        .to_string();
    if !content.is_empty() {
        debug!("Retrieved custom code ({} chars), runtime: {}", content.len(), runtime);
    }
    Ok(HookCode { content, runtime })
}

/// Fields shared by both hook creation payloads.
fn hook_body(hook: &Value, hook_type: &str) -> Value {
    let event_keys = hook
        .get("eventKeys")
        .and_then(|k| k.as_array())
        .cloned()
        .unwrap_or_default();
    let first_event = event_keys
        .first()
        .and_then(|k| k.as_str())
        .unwrap_or_default()
        .to_string();
    json!({
        "type": hook_type,
        "id": "create",
        "eventKeys": event_keys,
        "eventKey": first_event,
        "displayName": hook.get("displayName").and_then(|v| v.as_str()).unwrap_or_default(),
        "isActive": hook.get("isActive").and_then(|v| v.as_bool()).unwrap_or(false),
        "failMethod": hook.get("failMethod").and_then(|v| v.as_str()).unwrap_or("OPEN"),
        "timeout": hook.get("timeout").and_then(|v| v.as_u64()).unwrap_or(10),
    })
}

/// Create a CUSTOM_CODE hook carrying its code and runtime.
#[instrument(skip(client, hook, code), err)]
pub async fn create_custom_code_hook_impl(
    client: &VendorClient,
    hook: &Value,
    code: &HookCode,
) -> ClientResult<()> {
    let mut request_body = hook_body(hook, "CUSTOM_CODE");
    request_body["code"] = Value::String(code.content.clone());
    request_body["runtime"] = Value::String(code.runtime.clone());

    let environment_id = client.client_id.clone();
    client
        .request_json(
            Method::POST,
            "/prehooks/resources/configurations/v1/custom-code",
            &[(ENVIRONMENT_HEADER, environment_id.as_str())],
            Some(&request_body),
        )
        .await
        .map(|_| ())
}

/// Create an API hook carrying its url and signing secret.
#[instrument(skip(client, hook), err)]
pub async fn create_api_hook_impl(client: &VendorClient, hook: &Value) -> ClientResult<()> {
    let mut request_body = hook_body(hook, "API");
    request_body["url"] = hook.get("url").cloned().unwrap_or(Value::String(String::new()));
    request_body["secret"] = hook
        .get("secret")
        .cloned()
        .unwrap_or(Value::String(String::new()));

    let environment_id = client.client_id.clone();
    client
        .request_json(
            Method::POST,
            "/prehooks/resources/configurations/v1/api",
            &[(ENVIRONMENT_HEADER, environment_id.as_str())],
            Some(&request_body),
        )
        .await
        .map(|_| ())
}

/// Delete a hook by id.
#[instrument(skip(client), err)]
pub async fn delete_hook_impl(client: &VendorClient, hook_id: &str) -> ClientResult<()> {
    let environment_id = client.client_id.clone();
    let path = format!("{}/{}", CONFIGURATIONS_PATH, hook_id);
    client
        .delete(&path, &[(ENVIRONMENT_HEADER, environment_id.as_str())])
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_body_uses_first_event_key() {
        let hook = json!({
            "displayName": "Signup guard",
            "isActive": true,
            "failMethod": "CLOSE",
            "timeout": 30,
            "eventKeys": ["USER_SIGNED_UP", "USER_INVITED"],
        });
        let body = hook_body(&hook, "API");
        assert_eq!(body["type"], "API");
        assert_eq!(body["id"], "create");
        assert_eq!(body["eventKey"], "USER_SIGNED_UP");
        assert_eq!(body["eventKeys"].as_array().unwrap().len(), 2);
        assert_eq!(body["failMethod"], "CLOSE");
        assert_eq!(body["timeout"], 30);
    }

    #[test]
    fn test_hook_body_defaults() {
        let body = hook_body(&json!({}), "CUSTOM_CODE");
        assert_eq!(body["eventKey"], "");
        assert_eq!(body["isActive"], false);
        assert_eq!(body["failMethod"], "OPEN");
        assert_eq!(body["timeout"], 10);
    }
}
