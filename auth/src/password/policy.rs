use serde::Deserialize;

/// Password strength requirements.
///
/// Deserialized from service configuration and treated as read-only after
/// startup. Each character-class requirement is checked independently.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_lower: bool,
    pub require_upper: bool,
    pub require_symbol: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digit: true,
            require_lower: true,
            require_upper: true,
            require_symbol: true,
        }
    }
}

/// Check a password against the configured strength requirements.
///
/// Pure function; fails closed on empty or whitespace-only input. Length is
/// checked first, then each required character class. A symbol is any
/// non-alphanumeric character.
///
/// # Arguments
/// * `password` - Candidate password
/// * `requirements` - Strength requirements to enforce
///
/// # Returns
/// True when every configured requirement is met
pub fn meets_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.trim().is_empty() {
        return false;
    }

    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_lower && !password.chars().any(|c| c.is_lowercase()) {
        return false;
    }

    if requirements.require_upper && !password.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if requirements.require_symbol && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}
