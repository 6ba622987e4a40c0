//! Bearer token sources.
//!
//! The token is looked up at every handshake and appended to the endpoint
//! URL as the `access_token` query parameter.
//!
//! | Source | Lookup |
//! |--------|--------|
//! | [`TokenStore`] | Persistent JSON file, then in-memory session tier |
//! | [`StaticToken`] | Fixed value |
//! | [`EnvToken`] | Environment variable, read on every lookup |

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Storage key under which the authentication token is kept.
pub const AUTH_TOKEN_KEY: &str = "jhi-authenticationToken";

/// Default environment variable read by [`EnvToken::default`].
pub const DEFAULT_TOKEN_ENV: &str = "TRACKER_AUTH_TOKEN";

// ============================================================================
// TokenSource
// ============================================================================

/// Provides the bearer token for a handshake.
pub trait TokenSource: Send + Sync {
    /// Returns the current token, if any.
    fn token(&self) -> Option<String>;
}

// ============================================================================
// StaticToken
// ============================================================================

/// A fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Creates a static token source.
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

// ============================================================================
// EnvToken
// ============================================================================

/// Reads the token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    /// Creates a source reading `var`.
    #[inline]
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_ENV)
    }
}

impl TokenSource for EnvToken {
    fn token(&self) -> Option<String> {
        env::var(&self.var).ok().filter(|t| !t.is_empty())
    }
}

// ============================================================================
// TokenStore
// ============================================================================

/// Two-tier key/value token storage.
///
/// The persistent tier is a JSON object on disk (`{"key": "value"}`),
/// re-read on every lookup so external logins are picked up. The session
/// tier lives in memory for the lifetime of the store. Lookups check the
/// persistent tier first.
#[derive(Debug, Default)]
pub struct TokenStore {
    /// Path of the persistent JSON file.
    persistent: Option<PathBuf>,
    /// In-memory session values.
    session: RwLock<FxHashMap<String, String>>,
}

impl TokenStore {
    /// Creates a store with only the session tier.
    #[inline]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a store backed by a persistent JSON file.
    ///
    /// The file does not need to exist yet.
    #[inline]
    #[must_use]
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            persistent: Some(path.into()),
            session: RwLock::default(),
        }
    }

    /// Returns the persistent file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.persistent.as_deref()
    }

    /// Looks up `key`, persistent tier first.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_persistent(key).or_else(|| self.get_session(key))
    }

    /// Looks up `key` in the session tier only.
    #[must_use]
    pub fn get_session(&self, key: &str) -> Option<String> {
        self.session.read().get(key).cloned()
    }

    /// Looks up `key` in the persistent tier only.
    #[must_use]
    pub fn get_persistent(&self, key: &str) -> Option<String> {
        let path = self.persistent.as_ref()?;
        match Self::read_file(path) {
            Ok(map) => map.get(key).cloned(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read token store");
                None
            }
        }
    }

    /// Stores `value` in the session tier.
    pub fn set_session(&self, key: impl Into<String>, value: impl Into<String>) {
        self.session.write().insert(key.into(), value.into());
    }

    /// Stores `value` in the persistent tier.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Config`] if the store has no persistent file
    /// - [`crate::Error::Io`] / [`crate::Error::Json`] if the file cannot be updated
    pub fn set_persistent(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let path = self
            .persistent
            .as_ref()
            .ok_or_else(|| crate::Error::config("token store has no persistent file"))?;
        let mut map = Self::read_file(path)?;
        map.insert(key.into(), value.into());
        fs::write(path, serde_json::to_vec_pretty(&map)?)?;
        debug!(path = %path.display(), "Token store updated");
        Ok(())
    }

    /// Removes `key` from both tiers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] / [`crate::Error::Json`] if the persistent file
    /// cannot be updated.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.session.write().remove(key);
        if let Some(path) = &self.persistent {
            let mut map = Self::read_file(path)?;
            if map.remove(key).is_some() {
                fs::write(path, serde_json::to_vec_pretty(&map)?)?;
            }
        }
        Ok(())
    }

    fn read_file(path: &Path) -> Result<FxHashMap<String, String>> {
        match fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(FxHashMap::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FxHashMap::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TokenSource for TokenStore {
    fn token(&self) -> Option<String> {
        self.get(AUTH_TOKEN_KEY).filter(|t| !t.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token() {
        assert_eq!(StaticToken::new("abc").token(), Some("abc".to_string()));
        assert_eq!(StaticToken::new("").token(), None);
    }

    #[test]
    fn test_env_token_missing() {
        let source = EnvToken::new("TRACKER_LINK_TEST_SURELY_UNSET");
        assert_eq!(source.token(), None);
    }

    #[test]
    fn test_session_tier() {
        let store = TokenStore::in_memory();
        assert_eq!(store.token(), None);

        store.set_session(AUTH_TOKEN_KEY, "session-token");
        assert_eq!(store.token(), Some("session-token".to_string()));
    }

    #[test]
    fn test_persistent_tier_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_file(dir.path().join("storage.json"));

        store.set_session(AUTH_TOKEN_KEY, "session-token");
        store
            .set_persistent(AUTH_TOKEN_KEY, "persistent-token")
            .unwrap();

        assert_eq!(store.token(), Some("persistent-token".to_string()));
        assert_eq!(
            store.get_session(AUTH_TOKEN_KEY),
            Some("session-token".to_string())
        );
    }

    #[test]
    fn test_persistent_file_reread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = TokenStore::with_file(&path);
        assert_eq!(store.token(), None);

        fs::write(&path, r#"{"jhi-authenticationToken": "fresh"}"#).unwrap();
        assert_eq!(store.token(), Some("fresh".to_string()));
    }

    #[test]
    fn test_remove_clears_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_file(dir.path().join("storage.json"));
        store.set_session(AUTH_TOKEN_KEY, "a");
        store.set_persistent(AUTH_TOKEN_KEY, "b").unwrap();

        store.remove(AUTH_TOKEN_KEY).unwrap();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_set_persistent_without_file() {
        let store = TokenStore::in_memory();
        assert!(store.set_persistent(AUTH_TOKEN_KEY, "x").is_err());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();
        let store = TokenStore::with_file(&path);
        store.set_session(AUTH_TOKEN_KEY, "session-token");
        assert_eq!(store.token(), Some("session-token".to_string()));
    }
}
