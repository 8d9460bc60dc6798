//! Authentication primitives for the Batuara platform.
//!
//! Provides the security building blocks the identity service composes:
//! - Password hashing (Argon2id) and configurable strength rules
//! - Signed access tokens (HS256) with issuer/audience pinning
//! - Opaque refresh-token secret generation
//!
//! The library is deliberately free of web-framework and storage concerns.
//! The identity service wires these pieces into its own domain flows.
//!
//! # Examples
//!
//! ## Password hashing and strength
//! ```
//! use auth::PasswordHasher;
//! use auth::PasswordRequirements;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("Str0ng!Pass").unwrap();
//! assert!(hasher.verify("Str0ng!Pass", &hash).unwrap());
//!
//! let requirements = PasswordRequirements::default();
//! assert!(auth::meets_strength("Str0ng!Pass", &requirements));
//! assert!(!auth::meets_strength("weak", &requirements));
//! ```
//!
//! ## Access tokens
//! ```
//! use auth::TokenCodec;
//!
//! let codec = TokenCodec::new(
//!     b"secret_key_at_least_32_bytes_long!",
//!     "batuara-api",
//!     "batuara-clients",
//!     15,
//! );
//!
//! let issued = codec.issue("42", "admin@example.com", "Maria", "Admin").unwrap();
//! let claims = codec.validate(&issued.token).unwrap();
//! assert_eq!(claims.sub, "42");
//! assert_eq!(claims.role, "Admin");
//! ```
//!
//! ## Refresh secrets
//! ```
//! let secret = auth::generate_refresh_secret();
//! assert_eq!(secret.len(), 43); // 32 bytes, URL-safe base64, no padding
//! ```

pub mod jwt;
pub mod password;
pub mod refresh;

// Re-export commonly used items
pub use jwt::AccessClaims;
pub use jwt::IssuedToken;
pub use jwt::JwtError;
pub use jwt::TokenCodec;
pub use password::meets_strength;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use password::PasswordRequirements;
pub use refresh::generate_refresh_secret;
