//! Request-shaped inputs to the account operations.
//!
//! Every field is optional so a transport layer can hand over whatever the
//! client sent; blank strings count as absent.

use serde::Deserialize;

use super::error::{AuthError, FieldError};
use super::password::validate_password;
use crate::modules::utils::io::is_valid_email;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const FULL_NAME_MAX_LEN: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl RegisterRequest {
    pub fn new(username: &str, password: &str, full_name: &str, email: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            full_name: Some(full_name.to_string()),
            email: Some(email.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub username: Option<String>,
    pub new_password: Option<String>,
    pub forgot_code: Option<String>,
}

impl ResetPasswordRequest {
    pub fn new(username: &str, new_password: &str, forgot_code: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            new_password: Some(new_password.to_string()),
            forgot_code: Some(forgot_code.to_string()),
        }
    }
}

/// Registration fields after validation
#[derive(Debug, Clone)]
pub(crate) struct ValidRegistration {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
}

/// Treat `None`, empty and whitespace-only values alike
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Passwords are not trimmed, only checked for emptiness
pub(crate) fn present_secret(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub(crate) fn check_username(username: &str) -> Option<FieldError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Some(FieldError::new(
            "username",
            format!("must be {}-{} characters", USERNAME_MIN_LEN, USERNAME_MAX_LEN),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Some(FieldError::new(
            "username",
            "may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    None
}

pub(crate) fn check_password(password: &str) -> Option<FieldError> {
    validate_password(password)
        .err()
        .map(|e| FieldError::new("password", e.to_string()))
}

/// Validate a registration, reporting every offending field at once
pub(crate) fn validate_registration(req: &RegisterRequest) -> Result<ValidRegistration, AuthError> {
    let mut errors = Vec::new();

    let username = present(&req.username);
    match username {
        None => errors.push(FieldError::new("username", "is required")),
        Some(u) => errors.extend(check_username(u)),
    }

    let password = present_secret(&req.password);
    match password {
        None => errors.push(FieldError::new("password", "is required")),
        Some(p) => errors.extend(check_password(p)),
    }

    let full_name = present(&req.full_name);
    match full_name {
        None => errors.push(FieldError::new("fullName", "is required")),
        Some(n) if n.chars().count() > FULL_NAME_MAX_LEN => errors.push(FieldError::new(
            "fullName",
            format!("must be at most {} characters", FULL_NAME_MAX_LEN),
        )),
        Some(_) => {}
    }

    let email = present(&req.email);
    match email {
        None => errors.push(FieldError::new("email", "is required")),
        Some(e) if !is_valid_email(e) => {
            errors.push(FieldError::new("email", "is not a valid address"))
        }
        Some(_) => {}
    }

    match (username, password, full_name, email) {
        (Some(username), Some(password), Some(full_name), Some(email)) if errors.is_empty() => {
            Ok(ValidRegistration {
                username: username.to_string(),
                password: password.to_string(),
                full_name: full_name.to_string(),
                email: email.to_string(),
            })
        }
        _ => Err(AuthError::ValidationError(errors)),
    }
}
