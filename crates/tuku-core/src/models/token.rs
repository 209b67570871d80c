use serde::{Deserialize, Serialize};

/// Bearer token persisted between requests.
///
/// Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl CachedToken {
    pub fn new(access_token: String, issued_at: i64, expires_in: i64) -> Self {
        Self {
            access_token,
            issued_at,
            expires_at: issued_at + expires_in,
        }
    }

    /// A token is never served once `expires_at <= now`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.access_token.is_empty() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let token = CachedToken::new("abc".to_string(), 1_000, 60);
        assert_eq!(token.expires_at, 1_060);
        assert!(token.is_valid_at(1_059));
        assert!(!token.is_valid_at(1_060));
    }

    #[test]
    fn test_empty_token_is_never_valid() {
        let token = CachedToken::new(String::new(), 0, 3_600);
        assert!(!token.is_valid_at(10));
    }
}
