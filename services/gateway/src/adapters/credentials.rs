//! services/gateway/src/adapters/credentials.rs
//!
//! Credential lookup backed by a JSON file of the form
//! `{ "<username>": { "password": "<argon2 PHC>", "role": "admin" | "member" } }`.
//!
//! The file is re-read on every lookup, so edits apply without a restart.

use async_trait::async_trait;
use file_search_core::{CredentialStore, PortResult, Role, StoredCredentials};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, warn};

#[derive(Debug, Deserialize)]
struct UserEntry {
    password: String,
    #[serde(default)]
    role: String,
}

pub struct JsonCredentialStore {
    path: PathBuf,
}

impl JsonCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing or unparsable file yields no users.
    async fn load(&self) -> HashMap<String, UserEntry> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not read credential file {}: {}", self.path.display(), e);
                return HashMap::new();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            error!("Credential file {} is not valid: {}", self.path.display(), e);
            HashMap::new()
        })
    }
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn find_credentials(&self, username: &str) -> PortResult<Option<StoredCredentials>> {
        let mut users = self.load().await;
        Ok(users.remove(username).map(|entry| StoredCredentials {
            username: username.to_string(),
            password_hash: entry.password,
            role: Role::from_name(&entry.role).unwrap_or(Role::Member),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn users_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn reads_roles_with_member_fallback() {
        let file = users_file(
            r#"{
                "ann": { "password": "$argon2id$x", "role": "admin" },
                "bob": { "password": "$argon2id$y", "role": "superuser" },
                "cy":  { "password": "$argon2id$z" }
            }"#,
        );
        let store = JsonCredentialStore::new(file.path());

        let ann = store.find_credentials("ann").await.unwrap().unwrap();
        assert_eq!(ann.role, Role::Admin);
        assert_eq!(ann.password_hash, "$argon2id$x");
        let bob = store.find_credentials("bob").await.unwrap().unwrap();
        assert_eq!(bob.role, Role::Member);
        let cy = store.find_credentials("cy").await.unwrap().unwrap();
        assert_eq!(cy.role, Role::Member);
        assert!(store.find_credentials("dan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_or_broken_file_has_no_users() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonCredentialStore::new(dir.path().join("users.json"));
        assert!(missing.find_credentials("ann").await.unwrap().is_none());

        let file = users_file("{ not json");
        let broken = JsonCredentialStore::new(file.path());
        assert!(broken.find_credentials("ann").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn edits_apply_without_reload() {
        let file = users_file("{}");
        let store = JsonCredentialStore::new(file.path());
        assert!(store.find_credentials("ann").await.unwrap().is_none());

        std::fs::write(file.path(), r#"{ "ann": { "password": "h", "role": "member" } }"#).unwrap();
        assert!(store.find_credentials("ann").await.unwrap().is_some());
    }
}
