use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;

/// Refresh secret entropy in bytes (256 bits).
const SECRET_BYTES: usize = 32;

/// Generate an opaque refresh-token secret.
///
/// 256 bits from the CSPRNG, URL-safe base64 without padding. Never derived
/// from user data; uniqueness is additionally enforced by the storage layer's
/// unique constraint.
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_length() {
        // 32 bytes = 43 URL-safe base64 characters without padding
        assert_eq!(generate_refresh_secret().len(), 43);
    }

    #[test]
    fn test_secrets_are_unpredictable() {
        let first = generate_refresh_secret();
        let second = generate_refresh_secret();
        assert_ne!(first, second);
    }

    #[test]
    fn test_secret_is_url_safe() {
        let secret = generate_refresh_secret();
        assert!(secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(URL_SAFE_NO_PAD.decode(&secret).is_ok());
    }
}
