//! Application configuration management.
//!
//! Configuration is stored at `~/.config/okimmo/config.json`. The API base
//! URL and storage backend can be overridden with `OKIMMO_API_URL` and
//! `OKIMMO_STORAGE`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::REQUEST_TIMEOUT_SECS;
use crate::auth::{CredentialStore, FileStore, MemoryStore, StoreError};

/// Application name used for config directory paths
pub const APP_NAME: &str = "okimmo";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when nothing is configured
pub const DEFAULT_API_BASE_URL: &str = "http://10.0.2.2:8080/api/";

pub const ENV_API_URL: &str = "OKIMMO_API_URL";
pub const ENV_STORAGE: &str = "OKIMMO_STORAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Some(Self::File),
            "keyring" | "keychain" => Some(Self::Keyring),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub storage: Option<StorageBackend>,
    #[serde(default)]
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Base URL with environment override applied
    pub fn api_base_url(&self) -> String {
        std::env::var(ENV_API_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS))
    }

    /// Storage backend with environment override applied
    pub fn storage(&self) -> StorageBackend {
        std::env::var(ENV_STORAGE)
            .ok()
            .and_then(|v| StorageBackend::parse(&v))
            .or(self.storage)
            .unwrap_or_default()
    }

    /// Open the configured credential store
    pub fn open_store(&self) -> Result<Arc<dyn CredentialStore>, StoreError> {
        Self::open_backend(self.storage())
    }

    /// The keychain backend needs the `native-keychain` feature; without it
    /// keyring only has an in-memory mock and nothing would persist.
    pub fn open_backend(backend: StorageBackend) -> Result<Arc<dyn CredentialStore>, StoreError> {
        Ok(match backend {
            StorageBackend::File => Arc::new(FileStore::open_default()?),
            #[cfg(feature = "native-keychain")]
            StorageBackend::Keyring => Arc::new(crate::auth::KeyringStore::new()?),
            #[cfg(not(feature = "native-keychain"))]
            StorageBackend::Keyring => return Err(StoreError::KeychainUnavailable),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        })
    }
}
