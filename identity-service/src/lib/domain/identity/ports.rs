use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::identity::errors::AuthError;
use crate::identity::models::AuthTokens;
use crate::identity::models::RefreshToken;
use crate::identity::models::RegisterCommand;
use crate::identity::models::User;
use crate::identity::models::UserId;
use crate::identity::models::UserView;

/// Port for the authentication domain service.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Authenticate with email and password, issuing a fresh token pair.
    ///
    /// # Arguments
    /// * `email` - Account email (matched case-insensitively)
    /// * `password` - Plaintext password
    /// * `client_ip` - Originating client address, recorded on the ledger
    ///
    /// # Returns
    /// Access token, refresh secret, expiry, and the user view
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email, inactive account, or wrong
    ///   password; all three carry the same message
    async fn login(
        &self,
        email: &str,
        password: &str,
        client_ip: &str,
    ) -> Result<AuthTokens, AuthError>;

    /// Rotate a refresh token: revoke the presented secret, issue a new pair.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Secret unknown, expired, already revoked, or
    ///   lost a concurrent rotation race (replay detection)
    async fn refresh(
        &self,
        presented_secret: &str,
        client_ip: &str,
    ) -> Result<AuthTokens, AuthError>;

    /// Revoke a refresh token (logout).
    ///
    /// Idempotent: revoking a missing, expired, or already-revoked secret
    /// succeeds. Returns true in every non-error case.
    async fn revoke(&self, presented_secret: &str, client_ip: &str) -> Result<bool, AuthError>;

    /// Register a new user.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email taken (case-insensitive)
    /// * `WeakPassword` - Password fails the configured strength rules
    async fn register(&self, command: RegisterCommand) -> Result<UserView, AuthError>;

    /// Full access-token check: signature, claims, user exists, user active.
    ///
    /// Never errors; every failure at any stage is `false`.
    async fn validate_access_token(&self, token: &str) -> bool;

    /// Pass-through read; `None` is a valid, non-error outcome.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Pass-through read; `None` is a valid, non-error outcome.
    async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError>;
}

/// Persistence operations for the user aggregate.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist a new user. The store assigns the id.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Unique-email constraint violated
    /// * `Database` - Storage operation failed
    async fn create(&self, user: User) -> Result<User, AuthError>;

    /// Retrieve a user with their full ledger by id.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError>;

    /// Retrieve a user by email, case-insensitively.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Find the owner of a refresh secret among currently-active tokens.
    ///
    /// Revoked or expired secrets yield `None`; this is the replay-detection
    /// lookup.
    async fn find_by_active_refresh_secret(
        &self,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError>;

    /// Persist aggregate changes: user row, new ledger entries, revocation
    /// fields, and appended activity.
    ///
    /// Revocation fields are write-once in the store; an update can never
    /// clear them back to null.
    async fn update(&self, user: User) -> Result<User, AuthError>;

    /// Atomically revoke `presented_secret` and insert its replacement.
    ///
    /// The revoke applies only if the token is not already revoked, checked
    /// atomically by the store. Returns false when the caller lost a
    /// concurrent rotation of the same secret; nothing is persisted in that
    /// case.
    async fn rotate_refresh_token(
        &self,
        user_id: &UserId,
        presented_secret: &str,
        replacement: RefreshToken,
        revoked_by_ip: &str,
    ) -> Result<bool, AuthError>;
}
