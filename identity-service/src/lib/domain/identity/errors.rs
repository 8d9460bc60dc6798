use thiserror::Error;

/// Message returned for every credential failure.
///
/// Unknown email, deactivated account, wrong password, and invalid or reused
/// refresh tokens must be indistinguishable to the caller; internal logs
/// carry the real reason.
pub const GENERIC_CREDENTIALS_MESSAGE: &str = "Invalid credentials";

/// Error for UserId parsing failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid user id format: {0}")]
    InvalidFormat(String),
}

/// Error for EmailAddress validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for Role parsing failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("Unknown role: {0}")]
    Unknown(String),
}

/// Top-level error for all authentication operations.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Covers every credential failure with one fixed message.
    #[error("{}", GENERIC_CREDENTIALS_MESSAGE)]
    InvalidCredentials,

    #[error("Email already registered: {0}")]
    EmailAlreadyExists(String),

    #[error("Password does not meet the strength requirements")]
    WeakPassword,

    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid role: {0}")]
    InvalidRole(#[from] RoleError),

    #[error("Invalid user id: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("User not found: {0}")]
    NotFound(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Unknown(err.to_string())
    }
}
