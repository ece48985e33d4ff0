use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across the domain and pipeline layers.
///
/// `code` is a stable machine-readable string (`PROFILE_MALFORMED`,
/// `INDEX_UNAVAILABLE`, `GENERATION_FAILED`, ...). `retryable` marks
/// transport-level failures a caller may re-attempt; record-level errors
/// (a malformed profile) are never retryable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    /// Shorthand for a transient failure worth re-attempting.
    pub fn retryable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message).with_retryable(true)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
