use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::storage::audit::AuditEntry;
use crate::storage::sessions::{ClientMeta, Session};
use crate::storage::users::{CreateUser, Role, User};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email already exists: {0}")]
    DuplicateEmail(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage backend for user accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a new user
    async fn create_user(&self, user: CreateUser) -> StorageResult<User>;

    /// Get user by ID
    async fn get_user(&self, id: Uuid) -> StorageResult<User>;

    /// Get user by email (case-insensitive)
    async fn get_user_by_email(&self, email: &str) -> StorageResult<User>;

    /// List all users
    async fn list_users(&self) -> StorageResult<Vec<User>>;

    /// Replace the user's password hash and touch updated_at
    async fn update_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()>;

    /// Update the user's role
    async fn set_role(&self, id: Uuid, role: Role) -> StorageResult<()>;

    /// Update last login timestamp
    async fn update_last_login(&self, id: Uuid) -> StorageResult<()>;

    /// Delete user (cascades to sessions)
    async fn delete_user(&self, id: Uuid) -> StorageResult<()>;
}

/// Storage backend for bearer-token sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session row for the user
    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
        meta: &ClientMeta,
    ) -> StorageResult<Session>;

    /// Look up an unexpired session joined to its owning user.
    /// Expired rows are excluded here rather than actively deleted (lazy expiry).
    async fn find_valid(&self, token: &str) -> StorageResult<Option<(Session, User)>>;

    /// Move the session's expiry, used when sliding sessions are enabled
    async fn touch_expiry(&self, token: &str, expires_at: DateTime<Utc>) -> StorageResult<()>;

    /// Delete the session row for a token. Deleting an absent token is not an error.
    async fn delete_session(&self, token: &str) -> StorageResult<()>;

    /// Delete all expired session rows, returning the count removed
    async fn delete_expired(&self) -> StorageResult<u64>;
}

/// Storage backend for the auth audit trail
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Log an audit entry
    async fn log(&self, entry: AuditEntry) -> StorageResult<()>;

    /// Get recent audit entries
    async fn recent(&self, limit: i64) -> StorageResult<Vec<AuditEntry>>;

    /// Get audit entries for a specific user
    async fn for_user(&self, user_id: Uuid, limit: i64) -> StorageResult<Vec<AuditEntry>>;
}
