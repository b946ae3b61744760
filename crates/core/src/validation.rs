//! Client-side validation rules
//!
//! Each check mirrors a constraint the backend also enforces. Running them
//! locally only saves a round trip; a request that passes here can still be
//! rejected by the server.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Largest file the backend accepts (10 GiB)
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Shortest password the registration form accepts
pub const MIN_PASSWORD_LEN: usize = 6;

/// Page size used when the caller doesn't pick one
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page size the backend serves
pub const MAX_PER_PAGE: u32 = 100;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("email pattern is valid")
});

/// Validate an email address against the sign-in form's pattern
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::Required { field: "email" });
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Validate a password's length
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required { field: "password" });
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Validate a credential pair before sending it
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    validate_password(password)
}

/// Validate a 1-based page number and a page size
pub fn validate_pagination(page: u32, per_page: u32) -> Result<(), ValidationError> {
    if page == 0 {
        return Err(ValidationError::InvalidPage);
    }
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return Err(ValidationError::InvalidPerPage {
            value: per_page,
            min: 1,
            max: MAX_PER_PAGE,
        });
    }
    Ok(())
}

/// Validate a file size against an upload ceiling
pub fn validate_upload_size(filename: &str, size: u64, limit: u64) -> Result<(), ValidationError> {
    if size > limit {
        return Err(ValidationError::FileTooLarge {
            filename: filename.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Validate URL format
pub fn validate_url(value: &str, field: &'static str) -> Result<(), ValidationError> {
    let parsed =
        url::Url::parse(value).map_err(|e| ValidationError::invalid(field, format!("invalid URL - {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::invalid(
            field,
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(())
}
