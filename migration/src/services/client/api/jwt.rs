//! JWT settings operations.

use reqwest::Method;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::services::client::errors::ClientResult;
use crate::services::client::VendorClient;

use super::mail::VENDOR_HEADER;

const CONFIGURATIONS_PATH: &str = "/identity/resources/configurations/v1";

/// The subset of identity configuration this tool migrates.
const JWT_SETTING_KEYS: &[&str] = &[
    "defaultTokenExpiration",
    "defaultRefreshTokenExpiration",
    "cookieSameSite",
];

/// Extract the migrated JWT settings from a full configuration record,
/// dropping absent values.
pub fn extract_jwt_settings(configuration: &Value) -> Map<String, Value> {
    let mut settings = Map::new();
    for key in JWT_SETTING_KEYS {
        if let Some(value) = configuration.get(*key).filter(|v| !v.is_null()) {
            settings.insert((*key).to_string(), value.clone());
        }
    }
    settings
}

/// Fetch the account's JWT settings.
#[instrument(skip(client), err)]
pub async fn get_jwt_settings_impl(client: &VendorClient) -> ClientResult<Map<String, Value>> {
    let configuration = client
        .request_json(Method::GET, CONFIGURATIONS_PATH, &[], None)
        .await?;
    Ok(extract_jwt_settings(&configuration))
}

/// Push JWT settings to the account.
#[instrument(skip(client, settings), err)]
pub async fn update_jwt_settings_impl(
    client: &VendorClient,
    settings: &Map<String, Value>,
) -> ClientResult<()> {
    let vendor_id = client.client_id.clone();
    let request_body = Value::Object(settings.clone());
    client
        .request_json(
            Method::POST,
            CONFIGURATIONS_PATH,
            &[(VENDOR_HEADER, vendor_id.as_str())],
            Some(&request_body),
        )
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_jwt_settings_drops_nulls_and_extras() {
        let configuration = json!({
            "defaultTokenExpiration": 86400,
            "defaultRefreshTokenExpiration": null,
            "cookieSameSite": "none",
            "allowSignups": true,
        });
        let settings = extract_jwt_settings(&configuration);
        assert_eq!(settings.len(), 2);
        assert_eq!(settings["defaultTokenExpiration"], 86400);
        assert_eq!(settings["cookieSameSite"], "none");
        assert!(!settings.contains_key("defaultRefreshTokenExpiration"));
        assert!(!settings.contains_key("allowSignups"));
    }
}
