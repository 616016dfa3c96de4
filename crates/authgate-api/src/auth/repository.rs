//! PostgreSQL-backed user store and revocation ledger
//!
//! Schema lives in `migrations/`; [`PgStore::migrate`] applies it on startup.

use authgate_core::{
    AuthGateError, NewUser, Result, RevocationLedger, RevokedToken, User, UserStore, UserUpdate,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        User {
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Map a sqlx error, turning unique violations into `Conflict`
fn db_error(
    context: &'static str,
    conflict: &'static str,
) -> impl FnOnce(sqlx::Error) -> AuthGateError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AuthGateError::Conflict(conflict.to_string())
        }
        _ => AuthGateError::DatabaseError(format!("{context}: {e}")),
    }
}

/// User and revocation tables in PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let query = format!(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING {USER_COLUMNS}"
        );

        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to create user", "User already exists"))?;

        Ok(record.into())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthGateError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(record.map(User::from))
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        // COALESCE keeps columns whose new value is NULL, so one statement covers every subset
        let query = format!(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                email = COALESCE($3, email), \
                password_hash = COALESCE($4, password_hash), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(id)
            .bind(update.username)
            .bind(update.email)
            .bind(update.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to update user", "Email already in use"))?
            .ok_or_else(|| AuthGateError::NotFound("User".to_string()))?;

        Ok(record.into())
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthGateError::DatabaseError(format!("Failed to delete user: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AuthGateError::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthGateError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

#[async_trait::async_trait]
impl RevocationLedger for PgStore {
    async fn revoke(&self, entry: RevokedToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO revoked_tokens (jti, user_id, revoked_at) VALUES ($1, $2, $3) \
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(&entry.jti)
        .bind(entry.user_id)
        .bind(entry.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthGateError::DatabaseError(format!("Failed to revoke token: {e}")))?;

        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM revoked_tokens WHERE jti = $1")
                .bind(jti)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AuthGateError::DatabaseError(format!("Failed to check revocation: {e}"))
                })?;

        Ok(count > 0)
    }

    async fn purge_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AuthGateError::DatabaseError(format!("Failed to purge revocations: {e}"))
            })?;

        Ok(result.rows_affected())
    }
}
