//! Data models for the okimmo backend.
//!
//! - `UserProfile`: the cached snapshot of the signed-in user
//! - Auth wire types: `LoginRequest`, `RegisterRequest`, `RefreshRequest`,
//!   `AuthResponse`, `RefreshResponse`

pub mod auth;
pub mod user;

pub use auth::{AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest};
pub use user::UserProfile;
