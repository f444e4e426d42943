use std::sync::Arc;

use tracing::{info, warn};

use super::validation::{validate_login, validate_registration, RegistrationForm};
use super::{CredentialStore, StoreError};
use crate::api::{ApiClient, ApiError, AuthClient};
use crate::models::{AuthResponse, UserProfile};

/// Where the UI should send the user on startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Unauthenticated,
}

/// Decide the startup route from the stored access token alone.
pub fn bootstrap(store: &dyn CredentialStore) -> SessionState {
    if store.is_logged_in() {
        SessionState::Authenticated
    } else {
        SessionState::Unauthenticated
    }
}

/// Login, registration and logout on top of a credential store.
pub struct Session {
    store: Arc<dyn CredentialStore>,
    auth: AuthClient,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>, auth: AuthClient) -> Self {
        Self { store, auth }
    }

    /// Session sharing the store and auth client of `api`
    pub fn from_api(api: &ApiClient) -> Self {
        Self::new(api.store().clone(), api.auth().clone())
    }

    pub fn state(&self) -> SessionState {
        bootstrap(self.store.as_ref())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.store.profile()
    }

    /// Validate, authenticate and store the new session.
    ///
    /// Input is trimmed first. Invalid input fails with
    /// [`ApiError::Validation`] before anything is sent.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let (email, password) = (email.trim(), password.trim());
        validate_login(email, password)?;

        let response = self.auth.login(email, password).await?;
        let profile = self.establish(response)?;
        info!("Login successful");
        Ok(profile)
    }

    pub async fn register(&self, form: &RegistrationForm) -> Result<UserProfile, ApiError> {
        let form = form.trimmed();
        validate_registration(&form)?;

        let response = self
            .auth
            .register(&form.name, &form.email, &form.password)
            .await?;
        let profile = self.establish(response)?;
        info!("Registration successful");
        Ok(profile)
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// Store tokens first; the profile is a best-effort follow-up.
    fn establish(&self, response: AuthResponse) -> Result<UserProfile, ApiError> {
        self.store
            .save_tokens(&response.token, &response.refresh_token)?;
        if let Err(e) = self.store.save_profile(&response.user) {
            warn!(error = %e, "Failed to cache user profile");
        }
        Ok(response.user)
    }
}
