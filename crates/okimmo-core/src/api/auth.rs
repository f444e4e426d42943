//! Client for the `auth/*` endpoints.
//!
//! Uses its own plain `reqwest::Client`: requests made here never go through
//! the [`AuthInterceptor`](super::AuthInterceptor), so a refresh can't
//! recurse into another refresh.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::client::{build_http_client, join_url, parse_base_url, read_json, REQUEST_TIMEOUT_SECS};
use super::ApiError;
use crate::models::{AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest};

const LOGIN_PATH: &str = "auth/login";
const REGISTER_PATH: &str = "auth/register";
const REFRESH_PATH: &str = "auth/refresh";

#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: Url,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        debug!("Sending login request");
        self.post(LOGIN_PATH, &LoginRequest { email, password }).await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        debug!("Sending registration request");
        self.post(REGISTER_PATH, &RegisterRequest { name, email, password })
            .await
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        debug!("Sending token refresh request");
        self.post(REFRESH_PATH, &RefreshRequest { refresh_token }).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = join_url(&self.base_url, path)?;
        let response = self.client.post(url).json(body).send().await?;
        read_json(response).await
    }
}
