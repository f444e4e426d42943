//! Okimmo Core Library
//!
//! Session handling for the okimmo client:
//! - Credential storage (memory, file, OS keychain)
//! - Login and registration with local input validation
//! - An authenticated request path that attaches the bearer token and
//!   refreshes it once when the server answers 401
//!
//! # Example
//!
//! ```no_run
//! use okimmo_core::{ApiClient, Config, Session, SessionState};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let store = config.open_store()?;
//! let api = ApiClient::from_config(&config, store)?;
//! let session = Session::from_api(&api);
//!
//! if session.state() == SessionState::Unauthenticated {
//!     session.login("a@b.com", "secret1").await?;
//! }
//! let listings: serde_json::Value = api.get("listings").await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod notice;
pub mod utils;

pub use api::{ApiClient, ApiError, AuthClient, AuthInterceptor, Operation};
pub use auth::{
    bootstrap, CredentialStore, FileStore, KeyringStore, MemoryStore, RegistrationForm, Session,
    SessionState, StoreError, ValidationError,
};
pub use config::{Config, StorageBackend};
pub use models::{AuthResponse, RefreshResponse, UserProfile};
pub use notice::{Notice, Severity};
