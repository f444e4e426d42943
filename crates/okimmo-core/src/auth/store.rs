use std::sync::RwLock;

use thiserror::Error;

use crate::models::UserProfile;

/// Logical storage keys, shared by every backend
pub const KEY_ACCESS_TOKEN: &str = "token";
pub const KEY_REFRESH_TOKEN: &str = "refreshToken";
pub const KEY_USER_INFOS: &str = "user_infos";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize stored session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Could not find a config directory for session storage")]
    NoConfigDir,

    #[error("Keychain storage is not available in this build")]
    KeychainUnavailable,
}

/// Persistent home of the session credentials and the cached profile.
///
/// Reads never fail: a backend that cannot read its medium logs the problem
/// and reports the value as absent. Writes report their errors.
pub trait CredentialStore: Send + Sync {
    /// Overwrite both tokens together
    fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError>;

    /// Overwrite the cached profile, leaving the tokens alone
    fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;

    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    /// Cached profile; a corrupt entry reads as `None`
    fn profile(&self) -> Option<UserProfile>;

    /// Erase tokens and profile
    fn clear(&self) -> Result<(), StoreError>;

    fn is_logged_in(&self) -> bool {
        self.access_token().is_some_and(|t| !t.is_empty())
    }
}

/// Decode a stored profile, treating bad JSON as absent.
pub(crate) fn decode_profile(json: &str) -> Option<UserProfile> {
    match serde_json::from_str(json) {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable cached profile");
            None
        }
    }
}

#[derive(Debug, Default, Clone)]
struct MemoryState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    profile_json: Option<String>,
}

/// Process-local store. Nothing survives a restart; used in tests and by
/// embedders that persist credentials themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pair of tokens already on file
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                access_token: Some(access_token.to_string()),
                refresh_token: Some(refresh_token.to_string()),
                profile_json: None,
            }),
        }
    }

    /// Put raw JSON in the profile slot, bypassing serialization
    #[cfg(test)]
    pub(crate) fn set_raw_profile(&self, json: &str) {
        self.write().profile_json = Some(json.to_string());
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryStore {
    fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        let mut state = self.write();
        state.access_token = Some(access_token.to_string());
        state.refresh_token = Some(refresh_token.to_string());
        Ok(())
    }

    fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile)?;
        self.write().profile_json = Some(json);
        Ok(())
    }

    fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    fn profile(&self) -> Option<UserProfile> {
        let json = self.read().profile_json.clone()?;
        decode_profile(&json)
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.write() = MemoryState::default();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_profile() -> UserProfile {
    UserProfile {
        id: "42".to_string(),
        email: "a@b.com".to_string(),
        name: "Ada Lovelace".to_string(),
        created_at: "2024-01-15T08:30:00Z".to_string(),
        updated_at: "2024-02-01T12:00:00Z".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_read_tokens() {
        let store = MemoryStore::new();
        store.save_tokens("a", "r").unwrap();

        assert_eq!(store.access_token().as_deref(), Some("a"));
        assert_eq!(store.refresh_token().as_deref(), Some("r"));
        assert!(store.is_logged_in());
    }

    #[test]
    fn test_save_overwrites_both_tokens() {
        let store = MemoryStore::with_tokens("a1", "r1");
        store.save_tokens("a2", "r2").unwrap();

        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
    }

    #[test]
    fn test_clear_erases_everything() {
        let store = MemoryStore::with_tokens("a", "r");
        store.save_profile(&sample_profile()).unwrap();

        store.clear().unwrap();

        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.profile().is_none());
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_profile_independent_of_tokens() {
        let store = MemoryStore::new();
        store.save_profile(&sample_profile()).unwrap();

        assert_eq!(store.profile(), Some(sample_profile()));
        assert!(store.access_token().is_none());
    }

    #[test]
    fn test_corrupt_profile_reads_as_absent() {
        let store = MemoryStore::with_tokens("a", "r");
        store.set_raw_profile("{not json");

        assert!(store.profile().is_none());
        assert_eq!(store.access_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_empty_token_is_not_logged_in() {
        let store = MemoryStore::with_tokens("", "r");
        assert!(!store.is_logged_in());
    }
}
