//! Client error types

use thiserror::Error;

/// Error code the hosted API returns when a single-row request matched no rows
pub const NO_ROWS_CODE: &str = "PGRST116";
/// Unique violation reported by the backing database
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Structured error returned by the hosted API
    #[error("API error {code}: {message}")]
    Api {
        code: String,
        message: String,
        details: Option<String>,
    },

    /// Authentication required
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Request not acceptable (row-level policy or representation mismatch)
    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A report already exists for the natural key
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend temporarily unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// The targeted record does not exist (deleted, or never created)
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { code, .. } => code == NO_ROWS_CODE,
            _ => false,
        }
    }

    /// A report already exists for the natural key
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Api { code, .. } => code == UNIQUE_VIOLATION_CODE,
            _ => false,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Api { code, .. } => code != NO_ROWS_CODE && code != UNIQUE_VIOLATION_CODE,
            Self::Unauthorized(_) | Self::Unavailable(_) | Self::InvalidResponse(_) => true,
            Self::Forbidden(_)
            | Self::NotAcceptable(_)
            | Self::NotFound(_)
            | Self::Conflict(_)
            | Self::Validation(_)
            | Self::Serialization(_)
            | Self::Config(_) => false,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_api_error_is_not_found() {
        let err = ClientError::Api {
            code: NO_ROWS_CODE.into(),
            message: "Cannot coerce the result to a single JSON object".into(),
            details: Some("The result contains 0 rows".into()),
        };
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::Unavailable("timeout".into()).is_retryable());
        assert!(ClientError::Unauthorized("expired".into()).is_retryable());
        assert!(!ClientError::NotAcceptable("406".into()).is_retryable());
        assert!(!ClientError::Conflict("dup".into()).is_retryable());
        assert!(ClientError::Conflict("dup".into()).is_conflict());
        assert!(
            ClientError::Api {
                code: UNIQUE_VIOLATION_CODE.into(),
                message: "duplicate key".into(),
                details: None,
            }
            .is_conflict()
        );
    }
}
