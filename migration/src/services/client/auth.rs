//! Vendor authentication against `/auth/vendor`.

use serde_json::json;
use tracing::{debug, info, instrument};

use super::errors::ClientError;
use super::types::{current_time_secs, VendorToken};
use super::VendorClient;

/// Exchange client id + secret for a vendor token.
#[instrument(skip(client), err)]
pub(crate) async fn authenticate_impl(client: &VendorClient) -> Result<VendorToken, ClientError> {
    let preview_len = client.client_id.len().min(8);
    info!(
        "Authenticating with identity platform (client: {}...)",
        &client.client_id[..preview_len]
    );

    let endpoint = format!("{}/auth/vendor", client.base_url);
    let request_body = json!({
        "clientId": client.client_id,
        "secret": client.secret,
    });

    let response = client
        .http_client
        .post(&endpoint)
        .json(&request_body)
        .send()
        .await
        .map_err(|e| ClientError::Network {
            message: format!("Failed to call auth/vendor: {}", e),
        })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ClientError::AuthenticationFailed {
            message: format!("status {}: {}", status, error_text),
        });
    }

    let body: serde_json::Value = response.json().await.map_err(|e| ClientError::Network {
        message: format!("Failed to parse auth response: {}", e),
    })?;

    let token = body
        .get("token")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClientError::AuthenticationFailed {
            message: "no token found in response".to_string(),
        })?;
    let expires_in = body.get("expiresIn").and_then(|e| e.as_u64()).unwrap_or(3600);

    // Prefer the exp claim baked into the token; fall back to expiresIn.
    let expires_at =
        token_expiration(token).unwrap_or_else(|| current_time_secs() + expires_in);

    debug!("Vendor token expires at unix {}", expires_at);
    info!("Authentication successful for {}", client.base_url);

    Ok(VendorToken {
        token: token.to_string(),
        expires_at,
    })
}

/// Parse a JWT's `exp` claim without verifying the signature.
pub(crate) fn token_expiration(jwt: &str) -> Option<u64> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload_b64 = parts[1];
    let padded = match payload_b64.len() % 4 {
        2 => format!("{}==", payload_b64),
        3 => format!("{}=", payload_b64),
        _ => payload_b64.to_string(),
    };

    use base64::Engine;
    let decoded = base64::engine::general_purpose::URL_SAFE
        .decode(&padded)
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(&padded))
        .ok()?;
    let payload_str = String::from_utf8(decoded).ok()?;

    let payload: serde_json::Value = serde_json::from_str(&payload_str).ok()?;
    payload.get("exp")?.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiration_parsing() {
        // {"sub":"test","iat":1623976400,"exp":9999999999}
        let jwt = "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ0ZXN0IiwiaWF0IjoxNjIzOTc2NDAwLCJleHAiOjk5OTk5OTk5OTl9.sig";
        assert_eq!(token_expiration(jwt), Some(9999999999));
    }

    #[test]
    fn test_token_expiration_rejects_malformed_tokens() {
        assert_eq!(token_expiration("not-a-jwt"), None);
        assert_eq!(token_expiration("a.b"), None);
        assert_eq!(token_expiration("a.%%%.c"), None);
    }
}
