//! REST API client module for the okimmo backend.
//!
//! - `AuthClient`: login, registration and token refresh
//! - `AuthInterceptor`: attaches the bearer token and recovers once from a 401
//! - `ApiClient`: JSON helpers over the interceptor
//!
//! The API uses bearer access tokens that are exchanged for new ones with a
//! long-lived refresh token.

pub mod auth;
pub mod client;
pub mod error;
pub mod interceptor;

pub use auth::AuthClient;
pub use client::ApiClient;
pub use error::{ApiError, Operation};
pub use interceptor::AuthInterceptor;
