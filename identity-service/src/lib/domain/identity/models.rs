use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::identity::errors::EmailError;
use crate::identity::errors::RoleError;
use crate::identity::errors::UserIdError;

/// User aggregate entity.
///
/// The unit of mutation for everything auth-related: identity fields, the
/// refresh-token ledger, and the activity audit trail all live on the
/// aggregate and are persisted together.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub refresh_tokens: Vec<RefreshToken>,
    pub activity: Vec<UserActivity>,
}

impl User {
    /// Build a not-yet-persisted user for registration.
    ///
    /// The id is assigned by the store on create; until then it is zero.
    pub fn register(email: EmailAddress, name: String, role: Role, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: UserId(0),
            email,
            name,
            role,
            password_hash,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            refresh_tokens: Vec::new(),
            activity: Vec::new(),
        }
    }

    /// Bump the update timestamp.
    ///
    /// Called explicitly by every mutating operation on the aggregate.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a new active refresh token to the ledger.
    pub fn add_refresh_token(
        &mut self,
        secret: String,
        expires_at: DateTime<Utc>,
        created_by_ip: &str,
    ) {
        self.refresh_tokens
            .push(RefreshToken::new(secret, expires_at, created_by_ip));
        self.touch();
    }

    /// Revoke the not-yet-revoked token matching `secret`.
    ///
    /// No-op when no such token exists; revoking twice, or revoking a secret
    /// this user never held, is tolerated so concurrent logout races never
    /// error. Returns whether a token was revoked.
    pub fn revoke_refresh_token(
        &mut self,
        secret: &str,
        revoked_by_ip: &str,
        replaced_by_secret: Option<String>,
    ) -> bool {
        let Some(token) = self
            .refresh_tokens
            .iter_mut()
            .find(|t| t.secret == secret && !t.is_revoked())
        else {
            return false;
        };

        token.revoked_at = Some(Utc::now());
        token.revoked_by_ip = Some(revoked_by_ip.to_string());
        token.replaced_by_secret = replaced_by_secret;
        self.touch();
        true
    }

    /// Look up a ledger entry by secret, revoked or not.
    pub fn find_refresh_token(&self, secret: &str) -> Option<&RefreshToken> {
        self.refresh_tokens.iter().find(|t| t.secret == secret)
    }

    /// Tokens that are neither revoked nor expired at `now`.
    ///
    /// Multi-session policy: a user may hold one active token per session,
    /// so this is a list rather than an `Option`.
    pub fn active_refresh_tokens(&self, now: DateTime<Utc>) -> Vec<&RefreshToken> {
        self.refresh_tokens
            .iter()
            .filter(|t| t.is_active(now))
            .collect()
    }

    /// Stamp a successful login: last-login timestamp plus an audit record.
    pub fn record_login(&mut self, client_ip: &str) {
        self.last_login_at = Some(Utc::now());
        self.record_activity(ActivityKind::Login, client_ip);
    }

    /// Append an audit record and touch the aggregate.
    pub fn record_activity(&mut self, kind: ActivityKind, client_ip: &str) {
        self.activity.push(UserActivity {
            id: Uuid::new_v4(),
            kind,
            ip: client_ip.to_string(),
            at: Utc::now(),
        });
        self.touch();
    }
}

/// User unique identifier type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

impl UserId {
    /// Parse a user id out of a string, as carried in the JWT `sub` claim.
    ///
    /// # Errors
    /// * `InvalidFormat` - Not a base-10 integer
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        s.parse::<i64>()
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type.
///
/// Validates format via RFC 5322 compliant parser and normalizes to
/// lowercase, making uniqueness checks case-insensitive everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated, lowercased email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email.to_lowercase()))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Role of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Moderator,
    Editor,
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Case-insensitive: clients send whatever casing their forms produce
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "editor" => Ok(Role::Editor),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "Admin",
            Role::Moderator => "Moderator",
            Role::Editor => "Editor",
        };
        f.write_str(name)
    }
}

/// One entry in the refresh-token ledger.
///
/// Records are append-only: revocation fills in the revocation fields exactly
/// once and nothing is ever deleted, so replay attempts stay detectable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by_ip: String,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by_ip: Option<String>,
    pub replaced_by_secret: Option<String>,
}

impl RefreshToken {
    pub fn new(secret: String, expires_at: DateTime<Utc>, created_by_ip: &str) -> Self {
        Self {
            secret,
            expires_at,
            created_at: Utc::now(),
            created_by_ip: created_by_ip.to_string(),
            revoked_at: None,
            revoked_by_ip: None,
            replaced_by_secret: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}

/// Audit record for an authentication event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActivity {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub ip: String,
    pub at: DateTime<Utc>,
}

/// Kind of authentication event recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Login,
    Logout,
    Refresh,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityKind::Login => "login",
            ActivityKind::Logout => "logout",
            ActivityKind::Refresh => "refresh",
        };
        f.write_str(name)
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(ActivityKind::Login),
            "logout" => Ok(ActivityKind::Logout),
            "refresh" => Ok(ActivityKind::Refresh),
            other => Err(format!("unknown activity kind: {}", other)),
        }
    }
}

/// Read model of a user: everything a client may see, never the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.0,
            email: user.email.as_str().to_string(),
            name: user.name.clone(),
            role: user.role,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
        }
    }
}

/// Command to register a new user with validated fields.
#[derive(Debug)]
pub struct RegisterCommand {
    pub email: EmailAddress,
    pub password: String,
    pub name: String,
    pub role: Role,
}

impl RegisterCommand {
    pub fn new(email: EmailAddress, password: String, name: String, role: Role) -> Self {
        Self {
            email,
            password,
            name,
            role,
        }
    }
}

/// Credential set returned by login and refresh.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}
