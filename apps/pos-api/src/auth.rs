//! Token authentication module.
//!
//! Issues and verifies HS256 tokens. A token is only half the story: the
//! user row stores the id of the one live token, and the gate compares the
//! two on every request.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use pharma_core::Id;

/// Token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: Id,

    /// Administrator flag at issue time
    pub admin: bool,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Token id (v7 UUID), bound to the user row at login
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Missing token")]
    Missing,

    #[error("Malformed token")]
    Malformed,

    #[error("Token expired")]
    Expired,

    #[error("Token revoked, please log in again")]
    Revoked,

    #[error("Administrator privileges required")]
    NotAdmin,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Token issuer and verifier.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    /// Issues a token for a user.
    ///
    /// ## Returns
    /// The encoded token and its claims; the caller binds `claims.jti` to
    /// the user row.
    pub fn issue(&self, user_id: Id, admin: bool) -> Result<(String, Claims), TokenError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user_id,
            admin,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::now_v7().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, claims))
    }

    /// Checks signature and expiry. Revocation is checked by the gate.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }
}

/// Extracts the token from an `Authorization` header value.
///
/// The `Bearer ` prefix is accepted but not required.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let value = auth_header.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let tokens = TokenService::new("test-secret", 3600);
        let (token, issued) = tokens.issue(7, true).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims, issued);
        assert_eq!(claims.sub, 7);
        assert!(claims.admin);
    }

    #[test]
    fn test_each_login_gets_a_new_id() {
        let tokens = TokenService::new("test-secret", 3600);
        let (_, a) = tokens.issue(1, false).unwrap();
        let (_, b) = tokens.issue(1, false).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_expired_and_foreign_tokens() {
        let expired = TokenService::new("test-secret", -10);
        let (token, _) = expired.issue(1, false).unwrap();
        assert_eq!(expired.verify(&token), Err(TokenError::Expired));

        let other = TokenService::new("other-secret", 3600);
        let (token, _) = other.issue(1, false).unwrap();
        let tokens = TokenService::new("test-secret", 3600);
        assert_eq!(tokens.verify(&token), Err(TokenError::Malformed));
        assert_eq!(tokens.verify("not-a-token"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_bearer_prefix_is_optional() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token(""), None);
    }
}
