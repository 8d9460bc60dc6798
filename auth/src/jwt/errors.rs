use thiserror::Error;

/// Error type for access-token operations.
///
/// Validation failures are deliberately coarse: everything except expiry is
/// `Invalid`, so callers cannot tell a bad signature from a wrong issuer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is expired")]
    Expired,

    #[error("Token is invalid")]
    Invalid,
}
