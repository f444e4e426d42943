//! Bearer-token injection with a single refresh-and-retry on 401.
//!
//! Each call walks a small state machine:
//!
//! ```text
//! Prepared ──send──▶ Sent ──401──▶ Unauthorized ──refresh token──▶ Refreshing ──ok──▶ Retried
//!                     │                 │                              │
//!                     └─other──▶ done   └─none──▶ original 401         └─failed──▶ original 401
//! ```
//!
//! There is one retry at most, and concurrent requests that hit a 401 each
//! refresh on their own.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Request, Response, StatusCode};
use tracing::{debug, info, warn};

use super::AuthClient;
use crate::auth::CredentialStore;

enum Phase {
    /// Request carries the stored bearer token, if any
    Prepared { request: Request, replay: Option<Request> },
    /// First response received
    Sent { response: Response, replay: Option<Request> },
    /// Server rejected the token; `response` is what the caller gets if recovery fails
    Unauthorized { response: Response, replay: Request },
    Refreshing { response: Response, replay: Request, refresh_token: String },
    /// Copy of the original request carrying the new access token
    Retried { request: Request },
}

pub struct AuthInterceptor {
    transport: Client,
    store: Arc<dyn CredentialStore>,
    refresher: AuthClient,
}

impl AuthInterceptor {
    /// `transport` carries API traffic. `refresher` must not route through
    /// this interceptor.
    pub fn new(transport: Client, store: Arc<dyn CredentialStore>, refresher: AuthClient) -> Self {
        Self {
            transport,
            store,
            refresher,
        }
    }

    pub fn transport(&self) -> &Client {
        &self.transport
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn refresher(&self) -> &AuthClient {
        &self.refresher
    }

    /// Send `request` with the stored credentials.
    ///
    /// Transport failures are only reported for the first dispatch and the
    /// retry. A failed refresh never surfaces as an error; the caller gets
    /// the original 401 response instead.
    pub async fn execute(&self, mut request: Request) -> Result<Response, reqwest::Error> {
        if let Some(token) = self.store.access_token().filter(|t| !t.is_empty()) {
            attach_bearer(&mut request, &token);
        }
        let replay = request.try_clone();
        let mut phase = Phase::Prepared { request, replay };

        loop {
            phase = match phase {
                Phase::Prepared { request, replay } => {
                    debug!(method = %request.method(), url = %request.url(), "Dispatching request");
                    let response = self.transport.execute(request).await?;
                    Phase::Sent { response, replay }
                }

                Phase::Sent { response, replay } => {
                    if response.status() != StatusCode::UNAUTHORIZED {
                        return Ok(response);
                    }
                    match replay {
                        Some(replay) => Phase::Unauthorized { response, replay },
                        None => {
                            warn!(url = %response.url(), "Got 401 but request body can't be replayed");
                            return Ok(response);
                        }
                    }
                }

                Phase::Unauthorized { response, replay } => match self.store.refresh_token() {
                    Some(refresh_token) => Phase::Refreshing {
                        response,
                        replay,
                        refresh_token,
                    },
                    None => {
                        debug!(url = %response.url(), "Got 401 with no refresh token on file");
                        return Ok(response);
                    }
                },

                Phase::Refreshing {
                    response,
                    mut replay,
                    refresh_token,
                } => match self.refresh_access_token(&refresh_token).await {
                    Some(bearer) => {
                        replay.headers_mut().insert(AUTHORIZATION, bearer);
                        Phase::Retried { request: replay }
                    }
                    None => return Ok(response),
                },

                Phase::Retried { request } => {
                    debug!(method = %request.method(), url = %request.url(), "Retrying with refreshed token");
                    return self.transport.execute(request).await;
                }
            };
        }
    }

    /// Obtain and persist a new access token, returning the header for the
    /// retry. The refresh token on file is kept as-is. `None` means the
    /// caller should give up.
    async fn refresh_access_token(&self, refresh_token: &str) -> Option<HeaderValue> {
        let refreshed = match self.refresher.refresh(refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return None;
            }
        };

        // Never store a token that can't be sent
        let Some(bearer) = bearer_value(&refreshed.token) else {
            warn!("Refreshed access token is not a valid header value; discarding it");
            return None;
        };

        if let Err(e) = self.store.save_tokens(&refreshed.token, refresh_token) {
            // The new token is still good for this request
            warn!(error = %e, "Failed to persist refreshed access token");
        } else {
            info!("Access token refreshed");
        }
        Some(bearer)
    }
}

fn bearer_value(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).ok()?;
    value.set_sensitive(true);
    Some(value)
}

fn attach_bearer(request: &mut Request, token: &str) {
    match bearer_value(token) {
        Some(value) => {
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        None => warn!("Stored access token is not a valid header value; sending without it"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStore, StoreError};
    use crate::models::UserProfile;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn interceptor(server: &MockServer, store: Arc<dyn CredentialStore>) -> AuthInterceptor {
        let refresher = AuthClient::new(&format!("{}/api/", server.uri())).unwrap();
        AuthInterceptor::new(Client::new(), store, refresher)
    }

    fn get(server: &MockServer, route: &str) -> Request {
        Client::new()
            .get(format!("{}{}", server.uri(), route))
            .build()
            .unwrap()
    }

    async fn mount_refresh(
        server: &MockServer,
        refresh_token: &str,
        template: ResponseTemplate,
        times: impl Into<wiremock::Times>,
    ) {
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .and(body_json(serde_json::json!({"refreshToken": refresh_token})))
            .respond_with(template)
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_no_token_sends_no_authorization_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_stored_token_is_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_401_refreshes_once_and_retries_with_new_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .and(header("Authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(
            &server,
            "R1",
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "T2"})),
            1,
        )
        .await;

        let memory = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let store: Arc<dyn CredentialStore> = memory.clone();
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "fresh");
        assert_eq!(memory.access_token().as_deref(), Some("T2"));
        // Refresh token is not rotated
        assert_eq!(memory.refresh_token().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_empty_token_sends_no_authorization_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_tokens("", "R1"));
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let received = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_401_without_refresh_token_returns_original() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .expect(1)
            .mount(&server)
            .await;

        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.text().await.unwrap(), "expired");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("original"))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, "R1", ResponseTemplate::new(403), 1).await;

        let memory = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let store: Arc<dyn CredentialStore> = memory.clone();
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.text().await.unwrap(), "original");
        assert_eq!(memory.access_token().as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_unsendable_refreshed_token_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401).set_body_string("original"))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(
            &server,
            "R1",
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "T2\n"})),
            1,
        )
        .await;

        let memory = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let store: Arc<dyn CredentialStore> = memory.clone();
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.text().await.unwrap(), "original");
        assert_eq!(memory.access_token().as_deref(), Some("T1"));
        assert_eq!(memory.refresh_token().as_deref(), Some("R1"));
    }

    /// Holds a token pair but refuses every write
    struct ReadOnlyStore {
        inner: MemoryStore,
    }

    impl CredentialStore for ReadOnlyStore {
        fn save_tokens(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "read-only",
            )))
        }

        fn save_profile(&self, _: &UserProfile) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "read-only",
            )))
        }

        fn access_token(&self) -> Option<String> {
            self.inner.access_token()
        }

        fn refresh_token(&self) -> Option<String> {
            self.inner.refresh_token()
        }

        fn profile(&self) -> Option<UserProfile> {
            self.inner.profile()
        }

        fn clear(&self) -> Result<(), StoreError> {
            self.inner.clear()
        }
    }

    #[tokio::test]
    async fn test_retry_uses_new_token_when_it_cannot_be_saved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .and(header("Authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(
            &server,
            "R1",
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "T2"})),
            1,
        )
        .await;

        let store = Arc::new(ReadOnlyStore {
            inner: MemoryStore::with_tokens("T1", "R1"),
        });
        let response = interceptor(&server, store.clone())
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.access_token().as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_unreachable_refresh_endpoint_returns_original_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        // Port 1 on localhost refuses connections
        let refresher = AuthClient::new("http://127.0.0.1:1/api/").unwrap();
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let response = AuthInterceptor::new(Client::new(), store, refresher)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_retry_is_attempted_only_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        mount_refresh(
            &server,
            "R1",
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "T2"})),
            1,
        )
        .await;

        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_retry_preserves_method_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/favorites"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/favorites"))
            .and(header("Authorization", "Bearer T2"))
            .and(body_json(serde_json::json!({"listing": 7})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(
            &server,
            "R1",
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "T2"})),
            1,
        )
        .await;

        let request = Client::new()
            .post(format!("{}/api/favorites", server.uri()))
            .json(&serde_json::json!({"listing": 7}))
            .build()
            .unwrap();
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let response = interceptor(&server, store).execute(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, "R1", ResponseTemplate::new(200), 0).await;

        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let response = interceptor(&server, store)
            .execute(get(&server, "/api/listings"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_concurrent_401s_refresh_independently() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .and(header("Authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        mount_refresh(
            &server,
            "R1",
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "T2"})),
            1..=3,
        )
        .await;

        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_tokens("T1", "R1"));
        let interceptor = Arc::new(interceptor(&server, store));

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let interceptor = interceptor.clone();
                let request = get(&server, "/api/listings");
                tokio::spawn(async move { interceptor.execute(request).await })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            let response = result.unwrap().unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
