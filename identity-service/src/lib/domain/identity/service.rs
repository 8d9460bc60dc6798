use std::sync::Arc;

use async_trait::async_trait;
use auth::meets_strength;
use auth::IssuedToken;
use auth::PasswordHasher;
use auth::PasswordRequirements;
use auth::TokenCodec;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::identity::errors::AuthError;
use crate::identity::models::ActivityKind;
use crate::identity::models::AuthTokens;
use crate::identity::models::RefreshToken;
use crate::identity::models::RegisterCommand;
use crate::identity::models::User;
use crate::identity::models::UserId;
use crate::identity::models::UserView;
use crate::identity::ports::AuthServicePort;
use crate::identity::ports::UserRepository;

/// Authentication domain service.
///
/// Orchestrates password verification, token issuance, and refresh-token
/// rotation over an injected repository. Stateless per call; the signing key
/// and password policy are fixed at construction.
pub struct AuthService<R>
where
    R: UserRepository,
{
    repository: Arc<R>,
    password_hasher: PasswordHasher,
    codec: TokenCodec,
    requirements: PasswordRequirements,
    refresh_token_days: i64,
}

impl<R> AuthService<R>
where
    R: UserRepository,
{
    /// Create the service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `codec` - Access-token codec bound to the signing key
    /// * `requirements` - Password strength policy
    /// * `refresh_token_days` - Refresh-token lifetime
    pub fn new(
        repository: Arc<R>,
        codec: TokenCodec,
        requirements: PasswordRequirements,
        refresh_token_days: i64,
    ) -> Self {
        Self {
            repository,
            password_hasher: PasswordHasher::new(),
            codec,
            requirements,
            refresh_token_days,
        }
    }

    fn issue_access_token(&self, user: &User) -> Result<IssuedToken, AuthError> {
        self.codec
            .issue(
                &user.id.to_string(),
                user.email.as_str(),
                &user.name,
                &user.role.to_string(),
            )
            .map_err(|e| AuthError::Unknown(format!("Token generation failed: {}", e)))
    }

    fn refresh_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.refresh_token_days)
    }
}

#[async_trait]
impl<R> AuthServicePort for AuthService<R>
where
    R: UserRepository,
{
    async fn login(
        &self,
        email: &str,
        password: &str,
        client_ip: &str,
    ) -> Result<AuthTokens, AuthError> {
        // The three rejection paths below must be indistinguishable to the
        // caller; only the logs name the real reason.
        let Some(mut user) = self.repository.find_by_email(email).await? else {
            tracing::warn!(email, "Login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Login rejected: account deactivated");
            return Err(AuthError::InvalidCredentials);
        }

        let password_matches = self
            .password_hasher
            .verify(password, &user.password_hash)
            .map_err(|e| AuthError::Unknown(format!("Password verification failed: {}", e)))?;

        if !password_matches {
            tracing::warn!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.issue_access_token(&user)?;
        let refresh_secret = auth::generate_refresh_secret();
        user.add_refresh_token(
            refresh_secret.clone(),
            self.refresh_expiry(Utc::now()),
            client_ip,
        );
        user.record_login(client_ip);

        let user = self.repository.update(user).await?;
        tracing::info!(user_id = %user.id, "Login succeeded");

        Ok(AuthTokens {
            access_token: issued.token,
            refresh_token: refresh_secret,
            expires_at: issued.expires_at,
            user: UserView::from(&user),
        })
    }

    async fn refresh(
        &self,
        presented_secret: &str,
        client_ip: &str,
    ) -> Result<AuthTokens, AuthError> {
        let now = Utc::now();

        // Replay detection: only owners of a currently-active secret proceed
        let Some(user) = self
            .repository
            .find_by_active_refresh_secret(presented_secret, now)
            .await?
        else {
            tracing::warn!("Refresh rejected: secret not among active tokens");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Refresh rejected: account deactivated");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.issue_access_token(&user)?;
        let new_secret = auth::generate_refresh_secret();
        let replacement =
            RefreshToken::new(new_secret.clone(), self.refresh_expiry(now), client_ip);

        let rotated = self
            .repository
            .rotate_refresh_token(&user.id, presented_secret, replacement, client_ip)
            .await?;
        if !rotated {
            // Lost a concurrent rotation of the same secret; the winner
            // already revoked it
            tracing::warn!(user_id = %user.id, "Refresh rejected: token already revoked");
            return Err(AuthError::InvalidCredentials);
        }

        // Re-read so the audit append applies to the rotated state
        let mut user = self
            .repository
            .find_by_id(&user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        user.record_activity(ActivityKind::Refresh, client_ip);
        let user = self.repository.update(user).await?;

        tracing::info!(user_id = %user.id, "Refresh token rotated");

        Ok(AuthTokens {
            access_token: issued.token,
            refresh_token: new_secret,
            expires_at: issued.expires_at,
            user: UserView::from(&user),
        })
    }

    async fn revoke(&self, presented_secret: &str, client_ip: &str) -> Result<bool, AuthError> {
        let now = Utc::now();

        match self
            .repository
            .find_by_active_refresh_secret(presented_secret, now)
            .await?
        {
            // Already revoked, expired, or never issued: logout still succeeds
            None => Ok(true),
            Some(mut user) => {
                user.revoke_refresh_token(presented_secret, client_ip, None);
                user.record_activity(ActivityKind::Logout, client_ip);
                self.repository.update(user).await?;
                Ok(true)
            }
        }
    }

    async fn register(&self, command: RegisterCommand) -> Result<UserView, AuthError> {
        if !meets_strength(&command.password, &self.requirements) {
            return Err(AuthError::WeakPassword);
        }

        if self
            .repository
            .find_by_email(command.email.as_str())
            .await?
            .is_some()
        {
            return Err(AuthError::EmailAlreadyExists(
                command.email.as_str().to_string(),
            ));
        }

        let password_hash = self
            .password_hasher
            .hash(&command.password)
            .map_err(|e| AuthError::Unknown(format!("Password hashing failed: {}", e)))?;

        let user = User::register(command.email, command.name, command.role, password_hash);
        let created = self.repository.create(user).await?;

        tracing::info!(user_id = %created.id, "User registered");

        Ok(UserView::from(&created))
    }

    async fn validate_access_token(&self, token: &str) -> bool {
        let Ok(claims) = self.codec.validate(token) else {
            return false;
        };
        let Ok(user_id) = UserId::from_string(&claims.sub) else {
            return false;
        };

        match self.repository.find_by_id(&user_id).await {
            Ok(Some(user)) => user.is_active,
            _ => false,
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        self.repository.find_by_email(email).await
    }

    async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError> {
        self.repository.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use mockall::mock;
    use mockall::predicate::*;

    use super::*;
    use crate::identity::models::EmailAddress;
    use crate::identity::models::Role;

    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn create(&self, user: User) -> Result<User, AuthError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError>;
            async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
            async fn find_by_active_refresh_secret(
                &self,
                secret: &str,
                now: DateTime<Utc>,
            ) -> Result<Option<User>, AuthError>;
            async fn update(&self, user: User) -> Result<User, AuthError>;
            async fn rotate_refresh_token(
                &self,
                user_id: &UserId,
                presented_secret: &str,
                replacement: RefreshToken,
                revoked_by_ip: &str,
            ) -> Result<bool, AuthError>;
        }
    }

    const PASSWORD: &str = "Str0ng!Pass";

    fn service(repository: MockTestUserRepository) -> AuthService<MockTestUserRepository> {
        AuthService::new(
            Arc::new(repository),
            TokenCodec::new(
                b"test_secret_key_at_least_32_bytes!",
                "batuara-api",
                "batuara-clients",
                15,
            ),
            PasswordRequirements::default(),
            7,
        )
    }

    fn stored_user(id: i64) -> User {
        let mut user = User::register(
            EmailAddress::new("maria@batuara.org".to_string()).unwrap(),
            "Maria".to_string(),
            Role::Admin,
            PasswordHasher::new().hash(PASSWORD).unwrap(),
        );
        user.id = UserId(id);
        user
    }

    #[tokio::test]
    async fn test_login_success_issues_both_tokens() {
        let mut repository = MockTestUserRepository::new();

        let user = stored_user(7);
        repository
            .expect_find_by_email()
            .withf(|email| email == "maria@batuara.org")
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository
            .expect_update()
            .withf(|user| {
                user.last_login_at.is_some()
                    && user.active_refresh_tokens(Utc::now()).len() == 1
                    && user.activity.iter().any(|a| a.kind == ActivityKind::Login)
            })
            .times(1)
            .returning(|user| Ok(user));

        let service = service(repository);
        let tokens = service
            .login("maria@batuara.org", PASSWORD, "203.0.113.9")
            .await
            .unwrap();

        assert!(!tokens.access_token.is_empty());
        assert_eq!(tokens.refresh_token.len(), 43);
        assert_eq!(tokens.user.email, "maria@batuara.org");
        assert!(tokens.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_login_failures_share_one_message() {
        // Unknown email
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        let unknown = service(repository)
            .login("ghost@batuara.org", PASSWORD, "ip")
            .await
            .unwrap_err();

        // Deactivated account
        let mut repository = MockTestUserRepository::new();
        let mut user = stored_user(7);
        user.is_active = false;
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        let inactive = service(repository)
            .login("maria@batuara.org", PASSWORD, "ip")
            .await
            .unwrap_err();

        // Wrong password
        let mut repository = MockTestUserRepository::new();
        let user = stored_user(7);
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        let mismatch = service(repository)
            .login("maria@batuara.org", "Wr0ng!Pass", "ip")
            .await
            .unwrap_err();

        // No user-enumeration signal: identical messages across all causes
        assert_eq!(unknown.to_string(), inactive.to_string());
        assert_eq!(inactive.to_string(), mismatch.to_string());
    }

    #[tokio::test]
    async fn test_refresh_rotates_to_new_secret() {
        let mut repository = MockTestUserRepository::new();

        let mut user = stored_user(7);
        user.add_refresh_token(
            "old-secret".to_string(),
            Utc::now() + Duration::days(7),
            "ip",
        );

        let found = user.clone();
        repository
            .expect_find_by_active_refresh_secret()
            .withf(|secret, _| secret == "old-secret")
            .times(1)
            .returning(move |_, _| Ok(Some(found.clone())));
        repository
            .expect_rotate_refresh_token()
            .withf(|user_id, presented, replacement, _| {
                *user_id == UserId(7)
                    && presented == "old-secret"
                    && replacement.secret != "old-secret"
                    && !replacement.is_revoked()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));
        let refetched = user.clone();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(refetched.clone())));
        repository
            .expect_update()
            .withf(|user| user.activity.iter().any(|a| a.kind == ActivityKind::Refresh))
            .times(1)
            .returning(|user| Ok(user));

        let tokens = service(repository)
            .refresh("old-secret", "203.0.113.9")
            .await
            .unwrap();

        assert_ne!(tokens.refresh_token, "old-secret");
        assert_eq!(tokens.refresh_token.len(), 43);
    }

    #[tokio::test]
    async fn test_refresh_replay_rejected() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_active_refresh_secret()
            .times(1)
            .returning(|_, _| Ok(None));
        repository.expect_rotate_refresh_token().times(0);

        let err = service(repository)
            .refresh("already-used", "ip")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.to_string(), AuthError::InvalidCredentials.to_string());
    }

    #[tokio::test]
    async fn test_refresh_race_loser_gets_unauthorized() {
        let mut repository = MockTestUserRepository::new();

        let mut user = stored_user(7);
        user.add_refresh_token("secret".to_string(), Utc::now() + Duration::days(7), "ip");

        repository
            .expect_find_by_active_refresh_secret()
            .times(1)
            .returning(move |_, _| Ok(Some(user.clone())));
        // The store reports the token was already revoked by the winner
        repository
            .expect_rotate_refresh_token()
            .times(1)
            .returning(|_, _, _, _| Ok(false));
        repository.expect_update().times(0);

        let err = service(repository).refresh("secret", "ip").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        // Secret unknown or already revoked: still success, no writes
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_active_refresh_secret()
            .times(1)
            .returning(|_, _| Ok(None));
        repository.expect_update().times(0);

        assert!(service(repository).revoke("gone", "ip").await.unwrap());

        // Active secret: revoked and persisted
        let mut repository = MockTestUserRepository::new();
        let mut user = stored_user(7);
        user.add_refresh_token("live".to_string(), Utc::now() + Duration::days(7), "ip");
        repository
            .expect_find_by_active_refresh_secret()
            .times(1)
            .returning(move |_, _| Ok(Some(user.clone())));
        repository
            .expect_update()
            .withf(|user| {
                user.find_refresh_token("live").is_some_and(|t| t.is_revoked())
                    && user.activity.iter().any(|a| a.kind == ActivityKind::Logout)
            })
            .times(1)
            .returning(|user| Ok(user));

        assert!(service(repository).revoke("live", "ip").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_success() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_email()
            .withf(|email| email == "novo@batuara.org")
            .times(1)
            .returning(|_| Ok(None));
        repository
            .expect_create()
            .withf(|user| {
                user.email.as_str() == "novo@batuara.org"
                    && user.password_hash.starts_with("$argon2")
                    && user.is_active
            })
            .times(1)
            .returning(|mut user| {
                user.id = UserId(12);
                Ok(user)
            });

        let view = service(repository)
            .register(RegisterCommand::new(
                EmailAddress::new("Novo@Batuara.org".to_string()).unwrap(),
                PASSWORD.to_string(),
                "Novo".to_string(),
                Role::Editor,
            ))
            .await
            .unwrap();

        assert_eq!(view.id, 12);
        assert_eq!(view.email, "novo@batuara.org");
        assert_eq!(view.role, Role::Editor);
    }

    #[tokio::test]
    async fn test_register_weak_password_rejected_before_any_io() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_find_by_email().times(0);
        repository.expect_create().times(0);

        let err = service(repository)
            .register(RegisterCommand::new(
                EmailAddress::new("novo@batuara.org".to_string()).unwrap(),
                "alllowercase1".to_string(),
                "Novo".to_string(),
                Role::Editor,
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::WeakPassword));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut repository = MockTestUserRepository::new();
        let existing = stored_user(7);
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        repository.expect_create().times(0);

        let err = service(repository)
            .register(RegisterCommand::new(
                EmailAddress::new("MARIA@batuara.org".to_string()).unwrap(),
                PASSWORD.to_string(),
                "Other".to_string(),
                Role::Editor,
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::EmailAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_validate_access_token_checks_user_state() {
        // Same key and issuer/audience as the service under test
        let codec = TokenCodec::new(
            b"test_secret_key_at_least_32_bytes!",
            "batuara-api",
            "batuara-clients",
            15,
        );
        let token = codec
            .issue("7", "maria@batuara.org", "Maria", "Admin")
            .unwrap()
            .token;

        // Active user: valid
        let mut repository = MockTestUserRepository::new();
        let user = stored_user(7);
        repository
            .expect_find_by_id()
            .with(eq(UserId(7)))
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        assert!(service(repository).validate_access_token(&token).await);

        // Deactivated user: token signature is fine but validation fails
        let mut repository = MockTestUserRepository::new();
        let mut user = stored_user(7);
        user.is_active = false;
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        assert!(!service(repository).validate_access_token(&token).await);

        // Garbage never errors
        let repository = MockTestUserRepository::new();
        assert!(!service(repository).validate_access_token("junk").await);
    }
}
