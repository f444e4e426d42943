//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `CredentialStore`: the storage contract for the token pair and profile,
//!   with `MemoryStore`, `FileStore` and `KeyringStore` backends
//! - `Session`: validated login/registration and logout
//! - `bootstrap`: startup routing from the stored access token
//!
//! Tokens carry no client-side expiry; a session ends on logout or when the
//! server refuses to refresh it.

pub mod file;
pub mod keychain;
pub mod session;
pub mod store;
pub mod validation;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use session::{bootstrap, Session, SessionState};
pub use store::{CredentialStore, MemoryStore, StoreError};
pub use validation::{RegistrationForm, ValidationError};
