use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::traits::{StorageError, StorageResult, UserStore};

/// Coarse authorization label gating access to protected operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// User account. Provisioned via the CLI, never by self-registration.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// The public view returned by login and verify. Never carries the hash.
    pub fn projection(&self) -> UserProjection {
        UserProjection {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            full_name: self.full_name.clone(),
        }
    }
}

/// Public projection of a user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProjection {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub full_name: String,
}

/// User creation request
#[derive(Debug)]
pub struct CreateUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
}

/// PostgreSQL implementation of UserStore
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for users
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email VARCHAR(255) UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role VARCHAR(50) NOT NULL DEFAULT 'user',
                full_name VARCHAR(255) NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_login TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Lookups are case-insensitive; emails are stored lowercased as well
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_users_email ON users (LOWER(email))
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn map_user(row: &PgRow) -> StorageResult<User> {
    let role_str: String = row.get("role");
    let role = Role::parse(&role_str)
        .ok_or_else(|| StorageError::Internal(format!("unknown role value: {role_str}")))?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        full_name: row.get("full_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_login: row.get("last_login"),
    })
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create_user(&self, user: CreateUser) -> StorageResult<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let email = user.email.to_lowercase();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, full_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(id)
        .bind(&email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return StorageError::DuplicateEmail(email.clone());
                }
            }
            StorageError::Database(e)
        })?;

        Ok(User {
            id,
            email,
            password_hash: user.password_hash,
            role: user.role,
            full_name: user.full_name,
            created_at: now,
            updated_at: now,
            last_login: None,
        })
    }

    async fn get_user(&self, id: Uuid) -> StorageResult<User> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, role, full_name, created_at, updated_at, last_login
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::UserNotFound(id.to_string()))?;

        map_user(&row)
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<User> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, role, full_name, created_at, updated_at, last_login
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::UserNotFound(email.to_string()))?;

        map_user(&row)
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, password_hash, role, full_name, created_at, updated_at, last_login
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_user).collect()
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::UserNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::UserNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET last_login = NOW() WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::UserNotFound(id.to_string()));
        }

        Ok(())
    }
}
