//! Error types for chatread.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application, including configuration, I/O, LLM, search, prompt,
//! and request validation errors.

use thiserror::Error;

/// Unified error type for chatread.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Transport failures are carried as-is up to the caller.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Completion service errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Search index errors
    #[error("Search error: {0}")]
    Search(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Model identifier with no known context limit
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Malformed pipeline input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_message() {
        let err = AppError::UnknownModel("llama-9000".to_string());
        assert_eq!(err.to_string(), "Unknown model: llama-9000");
    }

    #[test]
    fn test_json_error_conversion() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
