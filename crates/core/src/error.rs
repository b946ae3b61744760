//! Errors raised by local validation, before anything reaches the network

/// A rule checked on the client that rejected its input.
///
/// These mirror the constraints the backend enforces, so that obviously bad
/// input fails fast. The server remains authoritative for every one of them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("page must be 1 or greater")]
    InvalidPage,

    #[error("per_page must be between {min} and {max}, got {value}")]
    InvalidPerPage { value: u32, min: u32, max: u32 },

    #[error("{filename} is {size} bytes, over the {limit} byte upload limit")]
    FileTooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ValidationError {
    /// Create a free-form validation error for a named field
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    /// Whether this error is the upload size ceiling
    pub const fn is_size_limit(&self) -> bool {
        matches!(self, Self::FileTooLarge { .. })
    }
}
