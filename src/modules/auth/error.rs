use itertools::Itertools;
use thiserror::Error;

/// One offending field of a request, with the rule it broke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every way an account operation can fail.
///
/// Each operation returns exactly one of these or a success payload.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing parameters")]
    MissingParameters,

    #[error("token not found")]
    MissingToken,

    #[error("validation failed: {}", .0.iter().map(|e| format!("{} ({})", e.field, e.message)).join(", "))]
    ValidationError(Vec<FieldError>),

    #[error("username doesn't exist")]
    NotFound,

    #[error("username already exists")]
    Conflict,

    #[error("password not match")]
    InvalidCredentials,

    #[error("already verified")]
    AlreadyVerified,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    ExpiredToken,

    #[error("token cannot be used for this purpose")]
    InvalidTokenPurpose,

    #[error("email hasn't been verified")]
    NotVerified,

    #[error("invalid forgot code")]
    InvalidCode,

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("cryptographic failure: {0}")]
    Crypto(String),
}

impl AuthError {
    /// HTTP status a web layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingParameters
            | AuthError::ValidationError(_)
            | AuthError::InvalidCredentials
            | AuthError::AlreadyVerified
            | AuthError::InvalidTokenPurpose
            | AuthError::NotVerified
            | AuthError::InvalidCode => 400,
            AuthError::InvalidToken | AuthError::ExpiredToken => 401,
            AuthError::MissingToken | AuthError::NotFound => 404,
            AuthError::Conflict => 409,
            AuthError::Storage(_) | AuthError::Crypto(_) => 500,
        }
    }

    /// Names of the offending fields, empty for non-validation errors
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        match self {
            AuthError::ValidationError(errors) => errors.iter().map(|e| e.field).collect(),
            _ => Vec::new(),
        }
    }
}
