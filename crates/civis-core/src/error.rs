//! Error types for the Civis client core.
//!
//! Every failure that crosses the transport, cache or session boundary is a
//! [`CivisError`]. The type is `Clone` because a single in-flight fetch can be
//! shared by several subscribers, each of which receives the same failure.

use std::path::PathBuf;
use thiserror::Error;

/// Fallback text shown when the server did not send a usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Main error type for the Civis client.
#[derive(Debug, Clone, Error)]
pub enum CivisError {
    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout: {message}")]
    Timeout { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        server_message: Option<String>,
    },

    #[error("Client error {status}: {message}")]
    Client {
        status: u16,
        message: String,
        /// Message extracted from the server payload, if any
        server_message: Option<String>,
    },

    #[error("Server error {status}: {message}")]
    Server {
        status: u16,
        message: String,
        server_message: Option<String>,
    },

    // Payload errors
    #[error("Failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("JSON error: {message}")]
    Json { message: String },

    // Session persistence errors
    #[error("Storage error at {path:?}: {message}")]
    Storage {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Cached value for {key} has an unexpected type")]
    TypeMismatch { key: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Civis operations.
pub type Result<T> = std::result::Result<T, CivisError>;

impl From<std::io::Error> for CivisError {
    fn from(err: std::io::Error) -> Self {
        CivisError::Storage {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for CivisError {
    fn from(err: serde_json::Error) -> Self {
        CivisError::Json {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for CivisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CivisError::Timeout {
                message: err.to_string(),
            }
        } else {
            CivisError::Network {
                message: err.to_string(),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }
}

impl CivisError {
    /// Create a storage error with path context.
    pub fn storage(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CivisError::Storage {
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// Build the error for a non-success HTTP status.
    ///
    /// `server_message` is the `message`/`error` field of the response body
    /// when the server sent one.
    pub fn from_status(status: u16, server_message: Option<String>) -> Self {
        let message = server_message
            .clone()
            .unwrap_or_else(|| format!("request failed with status {}", status));
        match status {
            401 => CivisError::Unauthorized {
                message,
                server_message,
            },
            500..=599 => CivisError::Server {
                status,
                message,
                server_message,
            },
            _ => CivisError::Client {
                status,
                message,
                server_message,
            },
        }
    }

    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            CivisError::Unauthorized { .. } => Some(401),
            CivisError::Client { status, .. } | CivisError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// No response was received at all.
    pub fn is_network(&self) -> bool {
        matches!(self, CivisError::Network { .. } | CivisError::Timeout { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CivisError::Unauthorized { .. })
    }

    /// Text suitable for showing to an administrator.
    ///
    /// Prefers the message the server put in the error payload and falls
    /// back to [`GENERIC_ERROR_MESSAGE`].
    pub fn user_message(&self) -> String {
        match self {
            CivisError::Client {
                server_message: Some(msg),
                ..
            }
            | CivisError::Server {
                server_message: Some(msg),
                ..
            }
            | CivisError::Unauthorized {
                server_message: Some(msg),
                ..
            } => msg.clone(),
            CivisError::Unauthorized { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            CivisError::Network { .. } | CivisError::Timeout { .. } => {
                "Could not reach the server. Check your connection.".to_string()
            }
            CivisError::Validation { message, .. } => message.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classifies_by_range() {
        assert!(CivisError::from_status(401, None).is_unauthorized());
        assert!(matches!(
            CivisError::from_status(404, None),
            CivisError::Client { status: 404, .. }
        ));
        assert!(matches!(
            CivisError::from_status(503, None),
            CivisError::Server { status: 503, .. }
        ));
    }

    #[test]
    fn test_user_message_prefers_server_payload() {
        let err = CivisError::from_status(422, Some("CPF já cadastrado".into()));
        assert_eq!(err.user_message(), "CPF já cadastrado");
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn test_user_message_falls_back_to_generic() {
        let err = CivisError::from_status(500, None);
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        assert_eq!(err.to_string(), "Server error 500: request failed with status 500");
    }

    #[test]
    fn test_unauthorized_user_message_uses_server_text_when_present() {
        let rejected = CivisError::from_status(401, Some("Credenciais inválidas".into()));
        assert!(rejected.is_unauthorized());
        assert_eq!(rejected.user_message(), "Credenciais inválidas");

        let expired = CivisError::from_status(401, None);
        assert_eq!(expired.user_message(), "Your session has expired. Please sign in again.");
    }

    #[test]
    fn test_network_errors_have_no_status() {
        let err = CivisError::Network {
            message: "connection refused".into(),
            cause: None,
        };
        assert!(err.is_network());
        assert_eq!(err.status(), None);
        assert!(!err.is_unauthorized());
    }
}
