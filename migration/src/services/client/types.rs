use serde::{Deserialize, Serialize};

/// Get current time in seconds since UNIX epoch
pub(crate) fn current_time_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Vendor token obtained from `/auth/vendor`, valid for one account.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VendorToken {
    pub token: String,
    pub expires_at: u64,
}

impl VendorToken {
    pub fn is_expired(&self) -> bool {
        current_time_secs() >= self.expires_at
    }

    /// Refresh one minute ahead of expiry so an in-flight request never
    /// crosses the boundary with a stale token.
    pub fn needs_refresh(&self) -> bool {
        current_time_secs() >= self.expires_at.saturating_sub(60)
    }
}

/// Outcome of a bulk invite request. The platform answers 200 for a
/// synchronous invite and 202 with a job id when it queues the batch.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BulkInviteOutcome {
    pub tenant_id: String,
    pub invited: usize,
    pub job_id: Option<String>,
}

/// Custom code attached to a CUSTOM_CODE hook configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HookCode {
    pub content: String,
    pub runtime: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry() {
        let live = VendorToken {
            token: "t".to_string(),
            expires_at: current_time_secs() + 3600,
        };
        assert!(!live.is_expired());
        assert!(!live.needs_refresh());

        let expiring = VendorToken {
            token: "t".to_string(),
            expires_at: current_time_secs() + 30,
        };
        assert!(!expiring.is_expired());
        assert!(expiring.needs_refresh());

        let expired = VendorToken {
            token: "t".to_string(),
            expires_at: current_time_secs().saturating_sub(10),
        };
        assert!(expired.is_expired());
        assert!(expired.needs_refresh());
    }
}
