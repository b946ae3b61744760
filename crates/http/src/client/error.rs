//! Client error types

use tensorbin_core::ValidationError;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed, or the session could not be refreshed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload exceeds the size ceiling or the user's quota
    #[error("Upload too large: {0}")]
    SizeLimit(String),

    /// Input rejected locally before dispatch
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Token persistence failed
    #[error("Token store error: {0}")]
    TokenStore(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        if err.is_size_limit() {
            Self::SizeLimit(err.to_string())
        } else {
            Self::Validation(err)
        }
    }
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 | 422 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            413 => Self::SizeLimit(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Consume an unsuccessful response and classify it
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::from_status(status, error_message(status, &body))
    }

    /// The session is gone and the user has to log in again
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub const fn is_size_limit(&self) -> bool {
        matches!(self, Self::SizeLimit(_))
    }

    /// Input was rejected, locally or by the server
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::BadRequest(_))
    }

    /// HTTP status behind this error, when there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            Self::ServerError { status, .. } => Some(*status),
            Self::AuthenticationFailed(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Forbidden(_) => Some(403),
            Self::Conflict(_) => Some(409),
            Self::SizeLimit(_) | Self::Validation(_) => None,
            Self::Serialization(_) | Self::Io(_) | Self::TokenStore(_) | Self::Configuration(_) => {
                None
            }
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers with `{"detail": "..."}`, or with a list of
/// `{"msg": "..."}` entries for request validation failures. Anything else
/// falls back to the raw body, then to the status text.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return messages.join("; ");
                }
            }
            _ => {}
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        body.to_string()
    }
}
