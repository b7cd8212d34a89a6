use thiserror::Error;

/// Client-side operation errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("API request failed: {method} {path} - status {status}: {body}")]
    Api {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid response format: expected {expected}, got {got}")]
    InvalidResponse { expected: String, got: String },
}

impl ClientError {
    /// HTTP status of an API-level failure, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the platform rejected a create call because the entity
    /// already exists. The error body carries an `errors` array of
    /// human-readable strings.
    pub fn is_already_exists(&self) -> bool {
        let ClientError::Api { body, .. } = self else {
            return false;
        };
        let Ok(content) = serde_json::from_str::<serde_json::Value>(body) else {
            return false;
        };
        content
            .get("errors")
            .and_then(|e| e.as_array())
            .map(|errors| {
                errors.iter().any(|e| {
                    e.as_str()
                        .map(|s| s.to_lowercase().contains("already exist"))
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    /// True for a 404 on a delete or fetch, which callers treat as a skip.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(body: &str) -> ClientError {
        ClientError::Api {
            method: "POST".to_string(),
            path: "/identity/resources/roles/v1".to_string(),
            status: 409,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_already_exists_detection() {
        let err = api_error(r#"{"errors": ["Role already exists in this account"]}"#);
        assert!(err.is_already_exists());

        let err = api_error(r#"{"errors": ["Key Already Exists"]}"#);
        assert!(err.is_already_exists());

        let err = api_error(r#"{"errors": ["invalid payload"]}"#);
        assert!(!err.is_already_exists());

        let err = api_error("not json at all");
        assert!(!err.is_already_exists());

        let err = ClientError::Network {
            message: "timeout".to_string(),
        };
        assert!(!err.is_already_exists());
    }

    #[test]
    fn test_not_found_detection() {
        let err = ClientError::Api {
            method: "DELETE".to_string(),
            path: "/identity/resources/users/v1/abc".to_string(),
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert!(!api_error("{}").is_not_found());
    }
}
