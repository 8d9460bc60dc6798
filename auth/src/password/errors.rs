use thiserror::Error;

/// Error type for password hashing operations.
///
/// Strength-rule failures are not errors; `meets_strength` returns a plain
/// bool so callers decide how to surface them.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Password verification failed: {0}")]
    VerificationFailed(String),
}
