use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::traits::{SessionStore, StorageError, StorageResult};
use super::users::{Role, User};

/// Client metadata captured at login for audit purposes
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A bearer-token session. Proof of a successful prior login.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// PostgreSQL implementation of SessionStore
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for sessions
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                session_token TEXT UNIQUE NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                ip_address VARCHAR(45),
                user_agent TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sessions_token ON sessions (session_token)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions (user_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions (expires_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
        meta: &ClientMeta,
    ) -> StorageResult<Session> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, session_token, expires_at, created_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .bind(&meta.ip_address)
        .bind(&meta.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(Session {
            id,
            user_id,
            token: token.to_string(),
            expires_at,
            created_at: now,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        })
    }

    async fn find_valid(&self, token: &str) -> StorageResult<Option<(Session, User)>> {
        // Single joined query; session columns are aliased so the two
        // created_at columns cannot collide.
        let row = sqlx::query(
            r#"
            SELECT
                s.id AS session_id,
                s.user_id,
                s.session_token,
                s.expires_at AS session_expires_at,
                s.created_at AS session_created_at,
                s.ip_address,
                s.user_agent,
                u.email,
                u.password_hash,
                u.role,
                u.full_name,
                u.created_at,
                u.updated_at,
                u.last_login
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.session_token = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role_str: String = row.get("role");
        let role = Role::parse(&role_str)
            .ok_or_else(|| StorageError::Internal(format!("unknown role value: {role_str}")))?;

        let session = Session {
            id: row.get("session_id"),
            user_id: row.get("user_id"),
            token: row.get("session_token"),
            expires_at: row.get("session_expires_at"),
            created_at: row.get("session_created_at"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
        };

        let user = User {
            id: row.get("user_id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            role,
            full_name: row.get("full_name"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            last_login: row.get("last_login"),
        };

        Ok(Some((session, user)))
    }

    async fn touch_expiry(&self, token: &str, expires_at: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE sessions SET expires_at = $2 WHERE session_token = $1
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_session(&self, token: &str) -> StorageResult<()> {
        // Idempotent: zero rows affected is still success, so callers learn
        // nothing about whether the token was ever valid.
        sqlx::query(
            r#"
            DELETE FROM sessions WHERE session_token = $1
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_expired(&self) -> StorageResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions WHERE expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
