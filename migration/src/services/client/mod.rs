//! Authenticated HTTP client for one identity-platform account.
//!
//! The migration runs with two of these: one against the source account's
//! base URL and one against the destination's. Per-resource operations
//! live in [`api`] as free functions taking the client as their first
//! argument.

pub mod api;
pub mod auth;
pub mod errors;
pub mod rate_limit;
pub mod types;

pub use errors::{ClientError, ClientResult};
pub use types::VendorToken;

use reqwest::{Client, Method};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::services::config::AccountConfig;
use rate_limit::{RateLimiter, RATE_LIMIT_BACKOFF_SECS};

/// Client for vendor API operations against one account
pub struct VendorClient {
    pub(crate) http_client: Client,
    pub(crate) base_url: String,
    pub(crate) client_id: String,
    pub(crate) secret: String,
    token: Mutex<Option<VendorToken>>,
    limiter: RateLimiter,
}

impl VendorClient {
    /// Create a client and authenticate immediately so a bad credential
    /// fails before any migration step runs.
    pub async fn connect(config: &AccountConfig) -> ClientResult<Self> {
        let client = Self {
            http_client: Client::builder()
                .user_agent("account-migration-service/1.0")
                .build()
                .map_err(|e| ClientError::Network {
                    message: format!("Failed to create HTTP client: {}", e),
                })?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            secret: config.api_key.clone(),
            token: Mutex::new(None),
            limiter: RateLimiter::new(),
        };
        client.bearer_token().await?;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The account's client id, which doubles as its vendor/environment id
    /// in several request headers.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current vendor token, re-authenticating when expired or near expiry.
    pub(crate) async fn bearer_token(&self) -> ClientResult<String> {
        let mut guard = self.token.lock().await;
        let refresh = match guard.as_ref() {
            Some(token) => token.needs_refresh(),
            None => true,
        };
        if refresh {
            if guard.is_some() {
                warn!("Token expired or missing, re-authenticating...");
            }
            *guard = Some(auth::authenticate_impl(self).await?);
        }
        Ok(guard.as_ref().map(|t| t.token.clone()).unwrap_or_default())
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ClientResult<reqwest::Response> {
        let token = self.bearer_token().await?;
        let mut request = self
            .http_client
            .request(method, url)
            .bearer_auth(token)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Issue one JSON request with per-endpoint rate limiting and a single
    /// 60 s retry when the platform answers 429. Success bodies that are
    /// empty or not JSON come back as `Value::Null`.
    pub(crate) async fn request_json(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ClientResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        self.limiter.acquire(path).await;
        debug!("API Request: {} {}", method, url);

        let mut response = self.send_once(method.clone(), &url, headers, body).await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limit exceeded. Retrying after delay...");
            tokio::time::sleep(std::time::Duration::from_secs(RATE_LIMIT_BACKOFF_SECS)).await;
            response = self.send_once(method.clone(), &url, headers, body).await?;
        }

        let status = response.status();
        let text = response.text().await.map_err(|e| ClientError::Network {
            message: format!("Failed to read response body: {}", e),
        })?;

        if status.is_success() {
            debug!("Response: {}", status);
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            match serde_json::from_str(&text) {
                Ok(value) => Ok(value),
                Err(_) => {
                    debug!("Non-JSON success body for {} ({} bytes)", path, text.len());
                    Ok(Value::Null)
                }
            }
        } else {
            Err(ClientError::Api {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            })
        }
    }

    /// DELETE a resource; callers inspect 404s themselves via
    /// [`ClientError::is_not_found`].
    pub(crate) async fn delete(&self, path: &str, headers: &[(&str, &str)]) -> ClientResult<()> {
        self.request_json(Method::DELETE, path, headers, None)
            .await
            .map(|_| ())
    }

    /// Follow `_links.next` pages, accumulating `items` until exhausted.
    pub(crate) async fn get_paginated_items(&self, path: &str) -> ClientResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = self.request_json(Method::GET, path, &[], None).await?;
        loop {
            if let Some(batch) = page.get("items").and_then(|i| i.as_array()) {
                items.extend(batch.iter().cloned());
            }
            let next = page
                .get("_links")
                .and_then(|l| l.get("next"))
                .and_then(|n| n.as_str())
                .unwrap_or("");
            let Some(offset) = extract_offset(next) else {
                break;
            };
            let next_path = format!("{}&_offset={}", path, offset);
            debug!("Fetching next page: {}", next_path);
            page = self.request_json(Method::GET, &next_path, &[], None).await?;
        }
        Ok(items)
    }
}

/// Pull the `_offset` value out of a `_links.next` relation.
pub(crate) fn extract_offset(next_link: &str) -> Option<u64> {
    let start = next_link.find("_offset=")? + "_offset=".len();
    let digits: String = next_link[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_offset() {
        assert_eq!(
            extract_offset("/identity/resources/users/v3?_limit=200&_offset=200"),
            Some(200)
        );
        assert_eq!(
            extract_offset("/users/v2?_offset=400&_limit=200"),
            Some(400)
        );
        assert_eq!(extract_offset(""), None);
        assert_eq!(extract_offset("/users/v2?_limit=200"), None);
        assert_eq!(extract_offset("_offset=notanumber"), None);
    }
}
