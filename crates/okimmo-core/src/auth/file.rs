//! File-backed credential storage.
//!
//! The whole session lives in one JSON document so that saving the token
//! pair or clearing the session is a single file operation. Writes go to a
//! temporary sibling and are renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{decode_profile, CredentialStore, StoreError};
use crate::config::APP_NAME;
use crate::models::UserProfile;

/// Session file name in the config directory
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    /// Profile kept as an opaque JSON string so a bad profile can't poison the tokens
    #[serde(rename = "user_infos", default, skip_serializing_if = "Option::is_none")]
    user_infos: Option<String>,
}

pub struct FileStore {
    path: PathBuf,
    state: RwLock<StoredSession>,
}

impl FileStore {
    /// Open the store at `path`, loading whatever session is already there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::load(&path);
        Self {
            path,
            state: RwLock::new(state),
        }
    }

    /// Open the store at `~/.config/okimmo/session.json`
    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::open(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf, StoreError> {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .ok_or(StoreError::NoConfigDir)?;
        Ok(config_dir.join(APP_NAME).join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> StoredSession {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredSession::default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read session file");
                return StoredSession::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(session) => {
                debug!(path = %path.display(), "Session loaded from file");
                session
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Ignoring unreadable session file");
                StoredSession::default()
            }
        }
    }

    fn persist(&self, session: &StoredSession) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(session)?;
        let tmp_path = self.path.with_extension("json.tmp");

        {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600); // Owner read/write only
            }
            let mut file = options.open(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "Session written to file");
        Ok(())
    }

    /// Apply `change` to a copy of the session, persist it, then publish it.
    fn update(&self, change: impl FnOnce(&mut StoredSession)) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        let mut next = state.clone();
        change(&mut next);
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn snapshot(&self) -> StoredSession {
        self.state.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl CredentialStore for FileStore {
    fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        self.update(|s| {
            s.access_token = Some(access_token.to_string());
            s.refresh_token = Some(refresh_token.to_string());
        })
    }

    fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile)?;
        self.update(|s| s.user_infos = Some(json))
    }

    fn access_token(&self) -> Option<String> {
        self.snapshot().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.snapshot().refresh_token
    }

    fn profile(&self) -> Option<UserProfile> {
        decode_profile(&self.snapshot().user_infos?)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *state = StoredSession::default();
        debug!(path = %self.path.display(), "Session file removed");
        Ok(())
    }
}
