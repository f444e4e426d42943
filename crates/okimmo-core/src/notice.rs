//! Advisory messages handed to the UI layer.

use std::fmt;

use crate::api::{ApiError, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

impl Severity {
    pub fn glyph(&self) -> &'static str {
        match self {
            Severity::Success => "✓",
            Severity::Error => "✗",
            Severity::Info => "ℹ",
            Severity::Warning => "⚠",
        }
    }
}

/// A non-blocking message for a toast, snackbar or status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Validation problems are warnings; everything else is an error.
    pub fn from_error(error: &ApiError, operation: Operation) -> Self {
        let severity = match error {
            ApiError::Validation(_) => Severity::Warning,
            _ => Severity::Error,
        };
        Self::new(severity, error.user_message(operation))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity.glyph(), self.message)
    }
}
