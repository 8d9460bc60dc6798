use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use auth::PasswordHasher;
use auth::TokenCodec;
use chrono::DateTime;
use chrono::Utc;
use identity_service::config::RateLimitPolicy;
use identity_service::domain::identity::errors::AuthError;
use identity_service::domain::identity::models::EmailAddress;
use identity_service::domain::identity::models::RefreshToken;
use identity_service::domain::identity::models::Role;
use identity_service::domain::identity::models::User;
use identity_service::domain::identity::models::UserId;
use identity_service::domain::identity::ports::UserRepository;
use identity_service::domain::identity::service::AuthService;
use identity_service::inbound::http::csrf::CsrfState;
use identity_service::inbound::http::rate_limit::RateLimiter;
use identity_service::inbound::http::router::create_router;
use identity_service::inbound::http::router::AppState;

pub const TEST_JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";
pub const ADMIN_EMAIL: &str = "admin@batuara.org";
pub const ADMIN_PASSWORD: &str = "Adm1n!Batuara";

/// In-memory stand-in for the Postgres repository so the API tests run
/// without a database. Mirrors the store's contracts: unique emails,
/// write-once revocation fields, and an atomic compare-and-swap rotation.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<i64, User>>,
    next_id: Mutex<i64>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, AuthError> {
        let mut users = self.users.lock().expect("users lock");

        if users.values().any(|existing| existing.email == user.email) {
            return Err(AuthError::EmailAlreadyExists(user.email.as_str().to_string()));
        }

        let mut next_id = self.next_id.lock().expect("next_id lock");
        *next_id += 1;

        let mut user = user;
        user.id = UserId(*next_id);
        users.insert(user.id.0, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError> {
        let users = self.users.lock().expect("users lock");
        Ok(users.get(&id.0).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let email = email.to_lowercase();
        let users = self.users.lock().expect("users lock");
        Ok(users
            .values()
            .find(|user| user.email.as_str() == email)
            .cloned())
    }

    async fn find_by_active_refresh_secret(
        &self,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError> {
        let users = self.users.lock().expect("users lock");
        Ok(users
            .values()
            .find(|user| {
                user.refresh_tokens
                    .iter()
                    .any(|token| token.secret == secret && token.is_active(now))
            })
            .cloned())
    }

    async fn update(&self, user: User) -> Result<User, AuthError> {
        let mut users = self.users.lock().expect("users lock");
        let stored = users
            .get_mut(&user.id.0)
            .ok_or_else(|| AuthError::NotFound(user.id.to_string()))?;

        let mut merged = user;

        // Revocation fields are write-once: a stale aggregate can never
        // resurrect a token the store already revoked.
        for token in &mut merged.refresh_tokens {
            if let Some(existing) = stored
                .refresh_tokens
                .iter()
                .find(|t| t.secret == token.secret)
            {
                if existing.revoked_at.is_some() {
                    token.revoked_at = existing.revoked_at;
                    token.revoked_by_ip = existing.revoked_by_ip.clone();
                    token.replaced_by_secret = existing.replaced_by_secret.clone();
                }
            }
        }

        for existing in &stored.refresh_tokens {
            if !merged
                .refresh_tokens
                .iter()
                .any(|t| t.secret == existing.secret)
            {
                merged.refresh_tokens.push(existing.clone());
            }
        }

        for existing in &stored.activity {
            if !merged.activity.iter().any(|a| a.id == existing.id) {
                merged.activity.push(existing.clone());
            }
        }

        *stored = merged.clone();

        Ok(merged)
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &UserId,
        presented_secret: &str,
        replacement: RefreshToken,
        revoked_by_ip: &str,
    ) -> Result<bool, AuthError> {
        let mut users = self.users.lock().expect("users lock");
        let Some(user) = users.get_mut(&user_id.0) else {
            return Ok(false);
        };

        let Some(token) = user
            .refresh_tokens
            .iter_mut()
            .find(|token| token.secret == presented_secret && token.revoked_at.is_none())
        else {
            return Ok(false);
        };

        token.revoked_at = Some(Utc::now());
        token.revoked_by_ip = Some(revoked_by_ip.to_string());
        token.replaced_by_secret = Some(replacement.secret.clone());

        user.refresh_tokens.push(replacement);
        user.updated_at = Utc::now();

        Ok(true)
    }
}

/// Test application that spawns a real server over the in-memory store,
/// pre-seeded with one administrator account.
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        // Generous limits so ordinary tests never trip the limiter.
        Self::spawn_with_rate_limit(vec![RateLimitPolicy {
            group: "general".to_string(),
            prefix: "/".to_string(),
            max_requests: 10_000,
            window_secs: 3_600,
        }])
        .await
    }

    pub async fn spawn_with_rate_limit(policies: Vec<RateLimitPolicy>) -> Self {
        let repository = Arc::new(InMemoryUserRepository::default());

        let hasher = PasswordHasher::new();
        let admin_hash = hasher.hash(ADMIN_PASSWORD).expect("Failed to hash password");
        let admin = User::register(
            EmailAddress::new(ADMIN_EMAIL.to_string()).expect("Invalid admin email"),
            "Administrator".to_string(),
            Role::Admin,
            admin_hash,
        );
        repository
            .create(admin)
            .await
            .expect("Failed to seed admin user");

        let codec = || TokenCodec::new(TEST_JWT_SECRET, "batuara-api", "batuara-clients", 15);

        let auth_service = Arc::new(AuthService::new(
            repository,
            codec(),
            Default::default(),
            7,
        ));

        let state = AppState {
            auth_service,
            codec: Arc::new(codec()),
            csrf: CsrfState::new(),
            rate_limiter: Arc::new(RateLimiter::new(policies)),
            refresh_token_days: 7,
            // reqwest will not send Secure cookies over plain http.
            secure_cookies: false,
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().expect("Failed to read local addr").port();
        let address = format!("http://127.0.0.1:{}", port);

        let router = create_router(state);
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        Self {
            address,
            api_client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create reqwest client"),
        }
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(format!("{}{}", self.address, path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(format!("{}{}", self.address, path))
    }

    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    pub fn post_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(token)
    }

    /// Log in and return the response body.
    pub async fn login(&self, email: &str, password: &str) -> serde_json::Value {
        let response = self
            .post("/auth/login")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute login request");

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Failed to parse login response")
    }

    pub async fn login_admin(&self) -> serde_json::Value {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Make any request so the CSRF middleware provisions a session, and
    /// return the token from the `XSRF-TOKEN` cookie it set.
    pub async fn bootstrap_csrf(&self) -> String {
        let response = self
            .get("/auth/verify")
            .send()
            .await
            .expect("Failed to execute bootstrap request");

        let token = response
            .cookies()
            .find(|cookie| cookie.name() == "XSRF-TOKEN")
            .map(|cookie| cookie.value().to_string())
            .expect("No XSRF-TOKEN cookie in response");
        token
    }
}
