//! API client for the okimmo REST backend.
//!
//! Every request made through `ApiClient` goes through the
//! [`AuthInterceptor`], so callers never handle bearer tokens themselves.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Request, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{ApiError, AuthClient, AuthInterceptor};
use crate::auth::CredentialStore;
use crate::config::Config;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, ApiError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Parse a base URL, making sure relative joins land under its last segment.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ApiError> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))
}

pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url, ApiError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
}

/// Check if response is successful, returning an error with body if not.
pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

/// Check the status, then decode the body as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = check_response(response).await?;
    let url = response.url().clone();
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)))
}

/// Authenticated API client.
/// Clone is cheap - the interceptor is shared and reqwest::Client pools connections.
#[derive(Clone)]
pub struct ApiClient {
    interceptor: Arc<AuthInterceptor>,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, store, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn from_config(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::with_timeout(&config.api_base_url(), store, config.request_timeout())
    }

    pub fn with_timeout(
        base_url: &str,
        store: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = parse_base_url(base_url)?;
        // Separate client for refreshes so they bypass the interceptor
        let refresher = AuthClient::with_timeout(base_url.as_str(), timeout)?;
        let transport = build_http_client(timeout)?;

        Ok(Self {
            interceptor: Arc::new(AuthInterceptor::new(transport, store, refresher)),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client for login/register/refresh calls
    pub fn auth(&self) -> &AuthClient {
        self.interceptor.refresher()
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        self.interceptor.store()
    }

    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        join_url(&self.base_url, path)
    }

    /// Start a request relative to the base URL; finish it with [`ApiClient::send`].
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.interceptor.transport().request(method, self.url(path)?))
    }

    /// Send a prepared request with the session credentials. Non-2xx
    /// responses are returned as responses, not errors.
    pub async fn send(&self, request: Request) -> Result<Response, ApiError> {
        Ok(self.interceptor.execute(request).await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.request(Method::GET, path)?.build()?;
        debug!(path, "GET");
        read_json(self.send(request).await?).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.request(Method::POST, path)?.json(body).build()?;
        debug!(path, "POST");
        read_json(self.send(request).await?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, path)?.build()?;
        debug!(path, "DELETE");
        check_response(self.send(request).await?).await?;
        Ok(())
    }
}
