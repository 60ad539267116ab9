//! Cache for the short-lived JWT the API hands back in the `X-JWT-Token` header.

use crate::error::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Seconds shaved off a token's lifetime so it is never presented right as it expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    expires_at: i64,
}

#[derive(Debug, Default)]
pub struct TokenStore {
    path: Option<PathBuf>,
    current: RwLock<Option<StoredToken>>,
}

impl TokenStore {
    /// Open the store, picking up a previously cached token if the file exists and parses.
    pub fn load(path: Option<PathBuf>) -> Self {
        let current = path.as_ref().and_then(|p| {
            let content = std::fs::read_to_string(p).ok()?;
            match serde_json::from_str::<StoredToken>(&content) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    warn!("Ignoring unreadable token cache {}: {}", p.display(), e);
                    None
                }
            }
        });

        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// The cached token if it has not expired yet.
    pub fn valid_token(&self) -> Option<String> {
        let guard = self.current.read().ok()?;
        let stored = guard.as_ref()?;
        let now = chrono::Utc::now().timestamp();
        (stored.expires_at - EXPIRY_MARGIN_SECS > now).then(|| stored.token.clone())
    }

    /// Remember a freshly issued token, then persist it when a cache path is configured.
    ///
    /// A failed write only loses the on-disk copy; the token stays usable in memory.
    pub fn store(&self, token: &str) {
        let Some(expires_at) = jwt_expiry(token) else {
            debug!("Received token without a readable exp claim, not caching it");
            return;
        };

        let stored = StoredToken {
            token: token.to_string(),
            expires_at,
        };

        if let Some(path) = &self.path {
            if let Err(e) = persist(path, &stored) {
                warn!("Failed to write token cache {}: {}", path.display(), e);
            }
        }

        if let Ok(mut guard) = self.current.write() {
            *guard = Some(stored);
        }
    }
}

fn persist(path: &Path, stored: &StoredToken) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string(stored)?)?;
    Ok(())
}

/// Read the `exp` claim from a JWT without verifying its signature.
fn jwt_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims["exp"].as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_jwt(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{exp}}}"#));
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_jwt_expiry_reads_exp_claim() {
        assert_eq!(jwt_expiry(&make_jwt(1_900_000_000)), Some(1_900_000_000));
        assert_eq!(jwt_expiry("not-a-jwt"), None);
    }

    #[test]
    fn test_store_and_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth_token.json");
        let token = make_jwt(chrono::Utc::now().timestamp() + 3600);

        let store = TokenStore::load(Some(path.clone()));
        assert!(store.valid_token().is_none());
        store.store(&token);
        assert_eq!(store.valid_token(), Some(token.clone()));

        let reloaded = TokenStore::load(Some(path));
        assert_eq!(reloaded.valid_token(), Some(token));
    }

    #[test]
    fn test_expired_token_is_not_returned() {
        let store = TokenStore::load(None);
        store.store(&make_jwt(chrono::Utc::now().timestamp() + 10));

        assert!(store.valid_token().is_none());
    }

    #[test]
    fn test_failed_write_keeps_token_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let token = make_jwt(chrono::Utc::now().timestamp() + 3600);

        let store = TokenStore::load(Some(blocker.join("auth_token.json")));
        store.store(&token);

        assert_eq!(store.valid_token(), Some(token));
    }

    #[test]
    fn test_corrupt_cache_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth_token.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = TokenStore::load(Some(path));
        assert!(store.valid_token().is_none());
    }
}
