use serde::Deserialize;
use serde::Serialize;

/// Claim set carried by a Batuara access token.
///
/// Every field is required; tokens missing a claim fail deserialization and
/// therefore validation. Identity claims (`sub`, `email`, `name`, `role`) are
/// what downstream collaborators consume; `jti` uniquely identifies the token
/// itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject: the user id, rendered as a string per RFC 7519.
    pub sub: String,

    /// Account email at issuance time.
    pub email: String,

    /// Display name at issuance time.
    pub name: String,

    /// Role name (Admin, Moderator, Editor).
    pub role: String,

    /// Unique token identifier, fresh per issuance.
    pub jti: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issuer, pinned to the service configuration.
    pub iss: String,

    /// Audience, pinned to the service configuration.
    pub aud: String,
}

impl AccessClaims {
    /// Check whether the token is expired at the given instant.
    ///
    /// Zero tolerance: a token is valid up to and including its `exp` second.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AccessClaims {
        AccessClaims {
            sub: "7".to_string(),
            email: "editor@batuara.org".to_string(),
            name: "João".to_string(),
            role: "Editor".to_string(),
            jti: "f3b4".to_string(),
            iat: 1_000,
            exp: 1_900,
            iss: "batuara-api".to_string(),
            aud: "batuara-clients".to_string(),
        }
    }

    #[test]
    fn test_is_expired_boundaries() {
        let claims = sample();
        assert!(!claims.is_expired(1_899));
        assert!(!claims.is_expired(1_900));
        assert!(claims.is_expired(1_901));
    }

    #[test]
    fn test_serde_roundtrip() {
        let claims = sample();
        let json = serde_json::to_string(&claims).unwrap();
        let back: AccessClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn test_missing_claim_rejected() {
        // No role claim: deserialization must fail rather than default
        let json = r#"{"sub":"7","email":"e@x.org","name":"n","jti":"j","iat":1,"exp":2,"iss":"i","aud":"a"}"#;
        assert!(serde_json::from_str::<AccessClaims>(json).is_err());
    }
}
