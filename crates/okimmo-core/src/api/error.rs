use thiserror::Error;

use crate::auth::{StoreError, ValidationError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Could not store session: {0}")]
    Store(#[from] StoreError),
}

/// What the user was trying to do when an error happened, which decides
/// the wording of the advisory message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Register,
    Request,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(truncated),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            409 => ApiError::Conflict(truncated),
            422 => ApiError::Unprocessable(truncated),
            429 => ApiError::RateLimited,
            code @ 500..=599 => ApiError::ServerError { status: code, body: truncated },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// HTTP status behind this error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest(_) => Some(400),
            ApiError::Unauthorized => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Conflict(_) => Some(409),
            ApiError::Unprocessable(_) => Some(422),
            ApiError::RateLimited => Some(429),
            ApiError::ServerError { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Advisory text suitable for a toast or status line.
    pub fn user_message(&self, operation: Operation) -> String {
        match self {
            ApiError::Validation(e) => e.to_string(),
            ApiError::Network(e) => Self::network_message(e),
            ApiError::Store(e) => format!("Error: {}", e),
            ApiError::InvalidResponse(_) => match operation {
                Operation::Login => "Login failed: unexpected server response".to_string(),
                Operation::Register => {
                    "Registration failed: unexpected server response".to_string()
                }
                Operation::Request => "Unexpected server response".to_string(),
            },
            other => match other.status() {
                Some(code) => Self::status_message(operation, code),
                None => format!("Error: {}", other),
            },
        }
    }

    fn status_message(operation: Operation, code: u16) -> String {
        let known = match (operation, code) {
            (_, 400) => Some("Invalid data"),
            (Operation::Login, 401) => Some("Incorrect email or password"),
            (Operation::Login, 404) => Some("Service unavailable"),
            (Operation::Register, 409) => Some("An account already exists with this email"),
            (Operation::Register, 422) => Some("Validation of the submitted data failed"),
            (Operation::Request, 401) => Some("Your session has expired, please log in again"),
            (_, 429) => Some("Too many attempts. Try again later"),
            (_, 500) => Some("Server error"),
            _ => None,
        };
        if let Some(message) = known {
            return message.to_string();
        }
        match operation {
            Operation::Login => format!("Login failed (code: {})", code),
            Operation::Register => format!("Registration failed (code: {})", code),
            Operation::Request => format!("Request failed (code: {})", code),
        }
    }

    fn network_message(error: &reqwest::Error) -> String {
        if error.is_timeout() {
            "Timeout - check your connection".to_string()
        } else if error.is_connect() {
            "Network error - check your connection".to_string()
        } else {
            format!("Error: {}", error)
        }
    }
}
