//! crates/file_search_core/src/token.rs
//!
//! Self-contained session tokens. A token carries the principal and its issue
//! time; validity depends only on its own contents, the server secret, and the
//! current time. There is no server-side session table.
//!
//! Format: `base64url(claims_json) "." base64url(hmac_sha256(encoded_claims))`.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::domain::{Principal, Role};
use crate::ports::{PortError, PortResult};

type HmacSha256 = Hmac<Sha256>;

/// Session lifetime: 7 days.
pub const SESSION_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("Malformed session token")]
    Malformed,
    #[error("Session token signature is invalid")]
    InvalidSignature,
    #[error("Session expired")]
    Expired,
}

/// An encoded, signed session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    /// Issue time, epoch milliseconds.
    iat: i64,
}

/// Issues and validates session tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    mac: HmacSha256,
    ttl_ms: i64,
}

impl TokenAuthority {
    pub fn new(secret: &[u8]) -> PortResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(PortError::Validation(format!(
                "session secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| PortError::Unexpected(format!("Failed to key HMAC: {}", e)))?;
        Ok(Self {
            mac,
            ttl_ms: SESSION_TTL_MS,
        })
    }

    /// Generates a random secret for processes started without one.
    pub fn generate_secret() -> Vec<u8> {
        let mut secret = vec![0u8; MIN_SECRET_LEN];
        OsRng.fill_bytes(&mut secret);
        secret
    }

    pub fn issue(&self, principal: &Principal) -> SessionToken {
        self.issue_at(principal, Utc::now().timestamp_millis())
    }

    pub fn issue_at(&self, principal: &Principal, issued_at_ms: i64) -> SessionToken {
        let claims = Claims {
            sub: principal.username.clone(),
            role: principal.role.as_str().to_string(),
            iat: issued_at_ms,
        };
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));
        SessionToken(format!("{}.{}", payload, signature))
    }

    pub fn validate(&self, token: &str) -> Result<Principal, AuthFailure> {
        self.validate_at(token, Utc::now().timestamp_millis())
    }

    pub fn validate_at(&self, token: &str, now_ms: i64) -> Result<Principal, AuthFailure> {
        let (payload, signature) = token.split_once('.').ok_or(AuthFailure::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthFailure::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthFailure::InvalidSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthFailure::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| AuthFailure::Malformed)?;
        let role = Role::from_name(&claims.role).ok_or(AuthFailure::Malformed)?;

        if claims.iat > now_ms {
            return Err(AuthFailure::Malformed);
        }
        if now_ms - claims.iat >= self.ttl_ms {
            return Err(AuthFailure::Expired);
        }

        Ok(Principal {
            username: claims.sub,
            role,
        })
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"an-adequately-long-test-secret-value!!";
    const T: i64 = 1_700_000_000_000;

    fn alice() -> Principal {
        Principal {
            username: "alice".to_string(),
            role: Role::Member,
        }
    }

    #[test]
    fn issued_token_carries_the_principal() {
        let tokens = TokenAuthority::new(SECRET).unwrap();
        let token = tokens.issue_at(&alice(), T);
        assert_eq!(tokens.validate_at(token.as_str(), T + 1000), Ok(alice()));
    }

    #[test]
    fn token_expires_exactly_seven_days_after_issue() {
        let tokens = TokenAuthority::new(SECRET).unwrap();
        let token = tokens.issue_at(&alice(), T);

        assert!(tokens.validate_at(token.as_str(), T + SESSION_TTL_MS - 1).is_ok());
        assert_eq!(
            tokens.validate_at(token.as_str(), T + SESSION_TTL_MS),
            Err(AuthFailure::Expired)
        );
        assert_eq!(
            tokens.validate_at(token.as_str(), T + SESSION_TTL_MS * 3),
            Err(AuthFailure::Expired)
        );
    }

    #[test]
    fn elevated_role_with_reused_signature_is_rejected() {
        let tokens = TokenAuthority::new(SECRET).unwrap();
        let token = tokens.issue_at(&alice(), T);
        let (_, signature) = token.as_str().split_once('.').unwrap();

        let forged_claims = serde_json::json!({ "sub": "alice", "role": "admin", "iat": T });
        let forged_payload = URL_SAFE_NO_PAD.encode(forged_claims.to_string());
        let forged = format!("{}.{}", forged_payload, signature);

        assert_eq!(
            tokens.validate_at(&forged, T + 1),
            Err(AuthFailure::InvalidSignature)
        );
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let ours = TokenAuthority::new(SECRET).unwrap();
        let theirs = TokenAuthority::new(&TokenAuthority::generate_secret()).unwrap();
        let token = theirs.issue_at(&alice(), T);
        assert_eq!(
            ours.validate_at(token.as_str(), T + 1),
            Err(AuthFailure::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = TokenAuthority::new(SECRET).unwrap();
        assert_eq!(tokens.validate_at("", T), Err(AuthFailure::Malformed));
        assert_eq!(tokens.validate_at("no-dot-here", T), Err(AuthFailure::Malformed));
        assert_eq!(tokens.validate_at("abc.!!!", T), Err(AuthFailure::Malformed));
    }

    #[test]
    fn token_issued_in_the_future_is_malformed() {
        let tokens = TokenAuthority::new(SECRET).unwrap();
        let token = tokens.issue_at(&alice(), T);
        assert_eq!(tokens.validate_at(token.as_str(), T - 1), Err(AuthFailure::Malformed));
    }

    #[test]
    fn short_secret_is_refused() {
        assert!(matches!(
            TokenAuthority::new(b"too-short"),
            Err(PortError::Validation(_))
        ));
    }
}
