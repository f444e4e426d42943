use keyring::Entry;
use tracing::{debug, warn};

use super::store::{
    decode_profile, CredentialStore, StoreError, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN,
    KEY_USER_INFOS,
};
use crate::models::UserProfile;

const SERVICE_NAME: &str = "okimmo";

/// Credential storage in the OS keychain, one entry per logical key.
pub struct KeyringStore {
    access: Entry,
    refresh: Entry,
    profile: Entry,
}

impl KeyringStore {
    pub fn new() -> Result<Self, StoreError> {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom service name, e.g. to keep test entries apart
    pub fn with_service(service: &str) -> Result<Self, StoreError> {
        Ok(Self {
            access: Entry::new(service, KEY_ACCESS_TOKEN)?,
            refresh: Entry::new(service, KEY_REFRESH_TOKEN)?,
            profile: Entry::new(service, KEY_USER_INFOS)?,
        })
    }

    fn read(entry: &Entry, key: &str) -> Option<String> {
        match entry.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read from keychain");
                None
            }
        }
    }

    fn delete(entry: &Entry) -> Result<(), StoreError> {
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Undo a half-written token pair. The refresh entry still holds the old
    /// value, so the old access token goes back next to it. If that fails
    /// both entries are dropped.
    fn restore_access(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(token) => self.access.set_password(token).map_err(StoreError::from),
            None => Self::delete(&self.access),
        };
        if let Err(e) = restored {
            warn!(error = %e, "Failed to restore previous access token; dropping both tokens");
            for entry in [&self.access, &self.refresh] {
                if let Err(e) = Self::delete(entry) {
                    warn!(error = %e, "Failed to remove keychain entry");
                }
            }
        }
    }
}

impl CredentialStore for KeyringStore {
    fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        let previous_access = self.access_token();
        self.access.set_password(access_token)?;
        if let Err(e) = self.refresh.set_password(refresh_token) {
            self.restore_access(previous_access.as_deref());
            return Err(e.into());
        }
        debug!("Tokens stored in keychain");
        Ok(())
    }

    fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile)?;
        self.profile.set_password(&json)?;
        Ok(())
    }

    fn access_token(&self) -> Option<String> {
        Self::read(&self.access, KEY_ACCESS_TOKEN)
    }

    fn refresh_token(&self) -> Option<String> {
        Self::read(&self.refresh, KEY_REFRESH_TOKEN)
    }

    fn profile(&self) -> Option<UserProfile> {
        decode_profile(&Self::read(&self.profile, KEY_USER_INFOS)?)
    }

    fn clear(&self) -> Result<(), StoreError> {
        // Attempt every entry before reporting the first failure
        let results = [
            Self::delete(&self.access),
            Self::delete(&self.refresh),
            Self::delete(&self.profile),
        ];
        debug!("Keychain entries cleared");
        results.into_iter().collect()
    }
}
