use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::identity::errors::AuthError;
use crate::domain::identity::models::ActivityKind;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::RefreshToken;
use crate::domain::identity::models::Role;
use crate::domain::identity::models::User;
use crate::domain::identity::models::UserActivity;
use crate::domain::identity::models::UserId;
use crate::domain::identity::ports::UserRepository;

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hydrate the full aggregate behind a users row: the row itself plus the
    /// refresh-token ledger and the activity trail.
    async fn load_user(&self, row: PgRow) -> Result<User, AuthError> {
        let id: i64 = row.try_get("id").map_err(db_err)?;

        let token_rows = sqlx::query(
            r#"
            SELECT secret, expires_at, created_at, created_by_ip,
                   revoked_at, revoked_by_ip, replaced_by_secret
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let refresh_tokens = token_rows
            .into_iter()
            .map(read_refresh_token)
            .collect::<Result<Vec<_>, _>>()?;

        let activity_rows = sqlx::query(
            r#"
            SELECT id, kind, ip, at
            FROM user_activity
            WHERE user_id = $1
            ORDER BY at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let activity = activity_rows
            .into_iter()
            .map(read_activity)
            .collect::<Result<Vec<_>, _>>()?;

        read_user(row, refresh_tokens, activity)
    }

    async fn hydrate(&self, row: Option<PgRow>) -> Result<Option<User>, AuthError> {
        match row {
            Some(row) => Ok(Some(self.load_user(row).await?)),
            None => Ok(None),
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, role, password_hash, is_active, \
                            last_login_at, created_at, updated_at";

fn db_err(e: sqlx::Error) -> AuthError {
    AuthError::Database(e.to_string())
}

fn read_user(
    row: PgRow,
    refresh_tokens: Vec<RefreshToken>,
    activity: Vec<UserActivity>,
) -> Result<User, AuthError> {
    let email: String = row.try_get("email").map_err(db_err)?;
    let role: String = row.try_get("role").map_err(db_err)?;

    Ok(User {
        id: UserId(row.try_get("id").map_err(db_err)?),
        email: EmailAddress::new(email)?,
        name: row.try_get("name").map_err(db_err)?,
        role: role.parse::<Role>()?,
        password_hash: row.try_get("password_hash").map_err(db_err)?,
        is_active: row.try_get("is_active").map_err(db_err)?,
        last_login_at: row.try_get("last_login_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
        refresh_tokens,
        activity,
    })
}

fn read_refresh_token(row: PgRow) -> Result<RefreshToken, AuthError> {
    Ok(RefreshToken {
        secret: row.try_get("secret").map_err(db_err)?,
        expires_at: row.try_get("expires_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        created_by_ip: row.try_get("created_by_ip").map_err(db_err)?,
        revoked_at: row.try_get("revoked_at").map_err(db_err)?,
        revoked_by_ip: row.try_get("revoked_by_ip").map_err(db_err)?,
        replaced_by_secret: row.try_get("replaced_by_secret").map_err(db_err)?,
    })
}

fn read_activity(row: PgRow) -> Result<UserActivity, AuthError> {
    let id: Uuid = row.try_get("id").map_err(db_err)?;
    let kind: String = row.try_get("kind").map_err(db_err)?;

    Ok(UserActivity {
        id,
        kind: kind
            .parse::<ActivityKind>()
            .map_err(AuthError::Database)?,
        ip: row.try_get("ip").map_err(db_err)?,
        at: row.try_get("at").map_err(db_err)?,
    })
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, AuthError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (email, name, role, password_hash, is_active,
                               last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(user.role.to_string())
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
                    return AuthError::EmailAlreadyExists(user.email.as_str().to_string());
                }
            }
            AuthError::Database(e.to_string())
        })?;

        let mut user = user;
        user.id = UserId(row.try_get("id").map_err(db_err)?);

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        self.hydrate(row).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        self.hydrate(row).await
    }

    async fn find_by_active_refresh_secret(
        &self,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError> {
        let sql = format!(
            r#"
            SELECT u.{} FROM users u
            JOIN refresh_tokens t ON t.user_id = u.id
            WHERE t.secret = $1
              AND t.revoked_at IS NULL
              AND t.expires_at > $2
            "#,
            USER_COLUMNS.replace(", ", ", u."),
        );
        let row = sqlx::query(&sql)
            .bind(secret)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        self.hydrate(row).await
    }

    async fn update(&self, user: User) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, name = $3, role = $4, password_hash = $5,
                is_active = $6, last_login_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id.0)
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(user.role.to_string())
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(user.id.to_string()));
        }

        // Ledger entries are append-or-revoke. COALESCE keeps revocation
        // fields write-once even when the aggregate in memory is stale.
        for token in &user.refresh_tokens {
            sqlx::query(
                r#"
                INSERT INTO refresh_tokens
                    (secret, user_id, expires_at, created_at, created_by_ip,
                     revoked_at, revoked_by_ip, replaced_by_secret)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (secret) DO UPDATE SET
                    revoked_at = COALESCE(refresh_tokens.revoked_at, EXCLUDED.revoked_at),
                    revoked_by_ip = COALESCE(refresh_tokens.revoked_by_ip, EXCLUDED.revoked_by_ip),
                    replaced_by_secret = COALESCE(refresh_tokens.replaced_by_secret, EXCLUDED.replaced_by_secret)
                "#,
            )
            .bind(&token.secret)
            .bind(user.id.0)
            .bind(token.expires_at)
            .bind(token.created_at)
            .bind(&token.created_by_ip)
            .bind(token.revoked_at)
            .bind(token.revoked_by_ip.as_deref())
            .bind(token.replaced_by_secret.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for entry in &user.activity {
            sqlx::query(
                r#"
                INSERT INTO user_activity (id, user_id, kind, ip, at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(entry.id)
            .bind(user.id.0)
            .bind(entry.kind.to_string())
            .bind(&entry.ip)
            .bind(entry.at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        Ok(user)
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &UserId,
        presented_secret: &str,
        replacement: RefreshToken,
        revoked_by_ip: &str,
    ) -> Result<bool, AuthError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Compare-and-swap on the revocation column. Exactly one concurrent
        // rotation of the same secret sees rows_affected == 1.
        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $3, revoked_by_ip = $4, replaced_by_secret = $5
            WHERE secret = $1
              AND user_id = $2
              AND revoked_at IS NULL
            "#,
        )
        .bind(presented_secret)
        .bind(user_id.0)
        .bind(Utc::now())
        .bind(revoked_by_ip)
        .bind(&replacement.secret)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if revoked.rows_affected() == 0 {
            // Lost the race or the secret was already dead. Nothing persists.
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (secret, user_id, expires_at, created_at, created_by_ip)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&replacement.secret)
        .bind(user_id.0)
        .bind(replacement.expires_at)
        .bind(replacement.created_at)
        .bind(&replacement.created_by_ip)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE users SET updated_at = $2 WHERE id = $1")
            .bind(user_id.0)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(true)
    }
}
