// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for EcoClass

use thiserror::Error;

/// Result type alias for EcoClass operations
pub type Result<T> = std::result::Result<T, EcoClassError>;

/// Hint shown after a failed login, in Indonesian with an English gloss
pub const LOGIN_HINT: &str = "Username atau password salah! (Invalid username or password)\n\
                              Demo:\nadmin / admin123\nuser / 123456";

/// Message shown when an upload is rejected
pub const INVALID_IMAGE_HINT: &str = "Pilih file gambar yang valid (JPG, PNG, WEBP <5MB)";

/// Credential check failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    /// User-facing hint for this failure
    pub fn hint(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => LOGIN_HINT,
        }
    }
}

/// Upload validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },
}

impl ValidationError {
    pub fn hint(&self) -> &'static str {
        match self {
            ValidationError::InvalidImage { .. } => INVALID_IMAGE_HINT,
        }
    }
}

/// Scan pipeline state violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No image selected for analysis")]
    NotArmed,

    #[error("Analysis already in progress")]
    Busy,
}

/// EcoClass error types
#[derive(Error, Debug)]
pub enum EcoClassError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Classification error: {0}")]
    Classifier(String),
}

impl EcoClassError {
    /// Message to show the user, falling back to the error text
    pub fn user_message(&self) -> String {
        match self {
            EcoClassError::Auth(e) => e.hint().to_string(),
            EcoClassError::Validation(e) => e.hint().to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_hint_is_bilingual() {
        let err: EcoClassError = AuthError::InvalidCredentials.into();
        let msg = err.user_message();
        assert!(msg.contains("password salah"));
        assert!(msg.contains("Invalid username or password"));
        assert!(msg.contains("admin / admin123"));
    }

    #[test]
    fn test_pipeline_error_passthrough() {
        let err: EcoClassError = PipelineError::Busy.into();
        assert_eq!(err.to_string(), "Analysis already in progress");
    }
}
