use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::encode;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use uuid::Uuid;

use super::claims::AccessClaims;
use super::errors::JwtError;

/// Access-token codec: issues and validates HS256-signed tokens.
///
/// Issuer, audience, signing key, and token lifetime are fixed at
/// construction and never change afterwards. Validation runs with zero
/// clock-skew tolerance.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    access_token_minutes: i64,
}

/// A freshly issued access token and its expiry instant.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenCodec {
    /// Create a codec bound to a signing key and issuer/audience pair.
    ///
    /// # Arguments
    /// * `secret` - Symmetric signing key; at least 32 bytes for HS256
    /// * `issuer` - Value stamped into and required from the `iss` claim
    /// * `audience` - Value stamped into and required from the `aud` claim
    /// * `access_token_minutes` - Token lifetime in minutes
    pub fn new(secret: &[u8], issuer: &str, audience: &str, access_token_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            access_token_minutes,
        }
    }

    /// Issue a signed access token for a user.
    ///
    /// Embeds the identity claims, a fresh `jti`, issued-at, and expiry at
    /// now plus the configured lifetime.
    ///
    /// # Errors
    /// * `EncodingFailed` - Signing failed
    pub fn issue(
        &self,
        sub: &str,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.access_token_minutes);

        let claims = AccessClaims {
            sub: sub.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate a token and return its claims.
    ///
    /// Verifies signature, issuer, audience, and expiry. All failure modes
    /// collapse to `Invalid` except expiry, which is surfaced as `Expired`
    /// so clients can distinguish a retryable condition.
    ///
    /// # Errors
    /// * `Expired` - Signature and claims check out but the token is past `exp`
    /// * `Invalid` - Any other failure (malformed, bad signature, wrong
    ///   issuer/audience/algorithm)
    pub fn validate(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.decode_checked(token, true)
    }

    /// Read the claims out of a token without checking expiry.
    ///
    /// Signature, issuer, audience, and algorithm are still enforced. Used
    /// only to recover the identity from an access token whose refresh is
    /// being requested.
    ///
    /// # Errors
    /// * `Invalid` - Any failure other than expiry
    pub fn claims_ignoring_expiry(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.decode_checked(token, false)
    }

    fn decode_checked(&self, token: &str, validate_exp: bool) -> Result<AccessClaims, JwtError> {
        // The header algorithm must be exactly HS256, independent of what the
        // validation below accepts. Guards against algorithm substitution.
        let header = decode_header(token).map_err(|_| JwtError::Invalid)?;
        if header.alg != self.algorithm {
            return Err(JwtError::Invalid);
        }

        // Expiry is checked against the claims below, with zero leeway.
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| JwtError::Invalid)?;

        if validate_exp && token_data.claims.is_expired(Utc::now().timestamp()) {
            return Err(JwtError::Expired);
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_secret_key_at_least_32_bytes!";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, "batuara-api", "batuara-clients", 15)
    }

    #[test]
    fn test_issue_and_validate() {
        let codec = codec();
        let issued = codec.issue("42", "admin@batuara.org", "Maria", "Admin").unwrap();

        let claims = codec.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "admin@batuara.org");
        assert_eq!(claims.name, "Maria");
        assert_eq!(claims.role, "Admin");
        assert_eq!(claims.iss, "batuara-api");
        assert_eq!(claims.aud, "batuara-clients");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_jti_is_unique_per_issuance() {
        let codec = codec();
        let first = codec.issue("1", "a@b.org", "A", "Editor").unwrap();
        let second = codec.issue("1", "a@b.org", "A", "Editor").unwrap();

        let first_claims = codec.validate(&first.token).unwrap();
        let second_claims = codec.validate(&second.token).unwrap();
        assert_ne!(first_claims.jti, second_claims.jti);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let codec = codec();
        let issued = codec.issue("42", "a@b.org", "A", "Admin").unwrap();

        // Flip a character in the payload segment
        let mut chars: Vec<char> = issued.token.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'a' { 'b' } else { 'a' };
        let tampered: String = chars.into_iter().collect();

        assert_eq!(codec.validate(&tampered), Err(JwtError::Invalid));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let codec = codec();
        let other = TokenCodec::new(
            b"another_secret_key_32_bytes_long!!",
            "batuara-api",
            "batuara-clients",
            15,
        );

        let issued = other.issue("42", "a@b.org", "A", "Admin").unwrap();
        assert_eq!(codec.validate(&issued.token), Err(JwtError::Invalid));
    }

    #[test]
    fn test_wrong_issuer_or_audience_rejected() {
        let codec = codec();
        let other_issuer = TokenCodec::new(SECRET, "someone-else", "batuara-clients", 15);
        let other_audience = TokenCodec::new(SECRET, "batuara-api", "someone-else", 15);

        let issued = other_issuer.issue("42", "a@b.org", "A", "Admin").unwrap();
        assert_eq!(codec.validate(&issued.token), Err(JwtError::Invalid));

        let issued = other_audience.issue("42", "a@b.org", "A", "Admin").unwrap();
        assert_eq!(codec.validate(&issued.token), Err(JwtError::Invalid));
    }

    #[test]
    fn test_wrong_algorithm_rejected() {
        let codec = codec();

        // Sign the same claim shape with HS384; header check must reject it
        let now = Utc::now();
        let claims = AccessClaims {
            sub: "42".to_string(),
            email: "a@b.org".to_string(),
            name: "A".to_string(),
            role: "Admin".to_string(),
            jti: "x".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(15)).timestamp(),
            iss: "batuara-api".to_string(),
            aud: "batuara-clients".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(codec.validate(&token), Err(JwtError::Invalid));
    }

    #[test]
    fn test_expired_token_distinguishable() {
        // Negative lifetime puts exp in the past at issuance
        let codec = TokenCodec::new(SECRET, "batuara-api", "batuara-clients", -5);
        let issued = codec.issue("42", "a@b.org", "A", "Admin").unwrap();

        assert_eq!(codec.validate(&issued.token), Err(JwtError::Expired));
    }

    #[test]
    fn test_claims_ignoring_expiry() {
        let codec = TokenCodec::new(SECRET, "batuara-api", "batuara-clients", -5);
        let issued = codec.issue("42", "a@b.org", "A", "Admin").unwrap();

        // Expired for full validation, readable for refresh purposes
        assert_eq!(codec.validate(&issued.token), Err(JwtError::Expired));
        let claims = codec.claims_ignoring_expiry(&issued.token).unwrap();
        assert_eq!(claims.sub, "42");

        // Still rejects a bad signature
        let other = TokenCodec::new(
            b"another_secret_key_32_bytes_long!!",
            "batuara-api",
            "batuara-clients",
            -5,
        );
        let forged = other.issue("42", "a@b.org", "A", "Admin").unwrap();
        assert_eq!(
            codec.claims_ignoring_expiry(&forged.token),
            Err(JwtError::Invalid)
        );
    }

    #[test]
    fn test_malformed_token_rejected() {
        let codec = codec();
        assert_eq!(codec.validate("not.a.token"), Err(JwtError::Invalid));
        assert_eq!(codec.validate(""), Err(JwtError::Invalid));
    }
}
