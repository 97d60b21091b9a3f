//! crates/file_search_core/src/access.rs
//!
//! Credential checks and the two authorization tiers built on session tokens.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::warn;

use crate::domain::Principal;
use crate::ports::{CredentialStore, PortError, PortResult};
use crate::token::{AuthFailure, TokenAuthority};

/// Hashes a password into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortError::Unexpected(format!("Failed to hash password: {}", e)))
}

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Verifies a password against an argon2 PHC string. An unparsable hash
/// never matches, and neither does a bcrypt hash.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if BCRYPT_PREFIXES.iter().any(|p| password_hash.starts_with(p)) {
        warn!("bcrypt hashes are not supported; re-hash the password with hash_password");
        return false;
    }
    let parsed = match PasswordHash::new(password_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Checks username/password pairs against the credential store.
pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    /// Verified against when the username is unknown, so both failure paths
    /// cost the same.
    decoy_hash: String,
}

impl Authenticator {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> PortResult<Self> {
        let decoy_hash = hash_password("decoy-password-for-unknown-users")?;
        Ok(Self {
            credentials,
            decoy_hash,
        })
    }

    /// Returns the principal on success; `None` for an unknown user and for a
    /// wrong password alike.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> PortResult<Option<Principal>> {
        let stored = self.credentials.find_credentials(username).await?;

        let (hash, principal) = match stored {
            Some(creds) => (
                creds.password_hash,
                Some(Principal {
                    username: creds.username,
                    role: creds.role,
                }),
            ),
            None => (self.decoy_hash.clone(), None),
        };

        let password = password.to_owned();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| PortError::Unexpected(format!("Password check panicked: {}", e)))?;

        Ok(if matches { principal } else { None })
    }
}

//=========================================================================================
// Authorization Tiers
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTier {
    Authenticated,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("Not authenticated")]
    MissingToken,
    #[error(transparent)]
    InvalidToken(#[from] AuthFailure),
    #[error("Administrator access required")]
    Forbidden,
}

impl AccessDenied {
    /// `true` for failures that mean "who are you?" rather than "not allowed".
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(self, AccessDenied::Forbidden)
    }
}

/// Evaluates a request's session token against a tier. Stateless.
pub fn authorize(
    tokens: &TokenAuthority,
    token: Option<&str>,
    tier: AccessTier,
) -> Result<Principal, AccessDenied> {
    let token = token.ok_or(AccessDenied::MissingToken)?;
    let principal = tokens.validate(token)?;
    if tier == AccessTier::Admin && !principal.is_admin() {
        return Err(AccessDenied::Forbidden);
    }
    Ok(principal)
}
