//! Object name validation.
//!
//! Valid object names:
//! - Must be non-empty and at most [`MAX_NAME_LEN`] bytes
//! - Must not contain whitespace or control characters
//! - Must not start or end with `/`
//! - Must not contain consecutive slashes (`//`)

use crate::error::{ClientError, ClientResult};

/// Longest accepted object name, in bytes.
pub const MAX_NAME_LEN: usize = 256;

fn invalid(name: &str, reason: impl Into<String>) -> ClientError {
    ClientError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate an object name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cellar_client::names::validate_object_name;
///
/// assert!(validate_object_name("dataset").is_ok());
/// assert!(validate_object_name("team/daily/features").is_ok());
/// assert!(validate_object_name("").is_err());
/// assert!(validate_object_name("has space").is_err());
/// ```
pub fn validate_object_name(name: &str) -> ClientResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "name must not be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(invalid(
            name,
            format!("longer than {MAX_NAME_LEN} bytes"),
        ));
    }

    if let Some(ch) = name.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }

    if name.contains("//") {
        return Err(invalid(name, "must not contain '//'"));
    }

    Ok(())
}
