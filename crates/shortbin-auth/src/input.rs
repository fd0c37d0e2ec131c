//! Shape checks for credentials, applied before any backend call.

use crate::error::{AuthError, Result};

pub const MIN_PASSWORD_LEN: usize = 8;
/// Upper bound on password length, in characters.
pub const MAX_PASSWORD_LEN: usize = 72;
pub const MAX_EMAIL_LEN: usize = 255;

/// Trims and lowercases an email, then checks it has the `local@domain` shape.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_ascii_lowercase();
    if email.len() > MAX_EMAIL_LEN {
        return Err(AuthError::InvalidParameters("email is too long".to_string()));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidParameters("email is malformed".to_string()))
    }
}

/// Length rule for new passwords. Counted in characters, not bytes.
pub fn check_new_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AuthError::InvalidParameters(format!(
            "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
