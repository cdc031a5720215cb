use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::traits::{AuditStore, StorageResult};

/// Auth events recorded in the audit trail
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    LoginSuccess,
    LoginFailed,
    Logout,
    PasswordChanged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFailed => "login_failed",
            Self::Logout => "logout",
            Self::PasswordChanged => "password_changed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "login_success" => Some(Self::LoginSuccess),
            "login_failed" => Some(Self::LoginFailed),
            "logout" => Some(Self::Logout),
            "password_changed" => Some(Self::PasswordChanged),
            _ => None,
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub action: AuditAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub http_method: Option<String>,
    pub http_path: Option<String>,
    pub http_status: Option<i32>,
    pub success: bool,
}

/// Builder for creating audit entries
#[derive(Debug)]
pub struct AuditEntryBuilder {
    user_id: Option<Uuid>,
    user_email: Option<String>,
    action: AuditAction,
    ip_address: Option<String>,
    user_agent: Option<String>,
    http_method: Option<String>,
    http_path: Option<String>,
    http_status: Option<i32>,
    success: bool,
}

impl AuditEntryBuilder {
    pub fn new(action: AuditAction) -> Self {
        Self {
            user_id: None,
            user_email: None,
            action,
            ip_address: None,
            user_agent: None,
            http_method: None,
            http_path: None,
            http_status: None,
            success: true,
        }
    }

    pub fn user_id(mut self, id: Uuid) -> Self {
        self.user_id = Some(id);
        self
    }

    pub fn user_email(mut self, email: &str) -> Self {
        self.user_email = Some(email.to_string());
        self
    }

    pub fn ip_address(mut self, ip: &str) -> Self {
        self.ip_address = Some(ip.to_string());
        self
    }

    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    pub fn http_request(mut self, method: &str, path: &str) -> Self {
        self.http_method = Some(method.to_string());
        self.http_path = Some(path.to_string());
        self
    }

    pub fn http_status(mut self, status: i32) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn build(self) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: self.user_id,
            user_email: self.user_email,
            action: self.action,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            http_method: self.http_method,
            http_path: self.http_path,
            http_status: self.http_status,
            success: self.success,
        }
    }
}

/// PostgreSQL implementation of AuditStore
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for the audit trail
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                user_id UUID,
                user_email VARCHAR(255),
                action VARCHAR(50) NOT NULL,
                ip_address VARCHAR(45),
                user_agent TEXT,
                http_method VARCHAR(10),
                http_path TEXT,
                http_status SMALLINT,
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log (timestamp DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log (user_id) WHERE user_id IS NOT NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn map_entry(row: &sqlx::postgres::PgRow) -> Option<AuditEntry> {
    let action_str: String = row.get("action");
    let action = AuditAction::parse(&action_str)?;

    Some(AuditEntry {
        id: row.get("id"),
        timestamp: row.get("timestamp"),
        user_id: row.get("user_id"),
        user_email: row.get("user_email"),
        action,
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        http_method: row.get("http_method"),
        http_path: row.get("http_path"),
        http_status: row.get::<Option<i16>, _>("http_status").map(i32::from),
        success: row.get("success"),
    })
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn log(&self, entry: AuditEntry) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, timestamp, user_id, user_email, action,
                ip_address, user_agent, http_method, http_path, http_status, success
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(entry.user_id)
        .bind(&entry.user_email)
        .bind(entry.action.as_str())
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.http_method)
        .bind(&entry.http_path)
        .bind(entry.http_status.map(|s| s as i16))
        .bind(entry.success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: i64) -> StorageResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, user_id, user_email, action,
                   ip_address, user_agent, http_method, http_path, http_status, success
            FROM audit_log
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(map_entry).collect())
    }

    async fn for_user(&self, user_id: Uuid, limit: i64) -> StorageResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, user_id, user_email, action,
                   ip_address, user_agent, http_method, http_path, http_status, success
            FROM audit_log
            WHERE user_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(map_entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trip() {
        for action in [
            AuditAction::LoginSuccess,
            AuditAction::LoginFailed,
            AuditAction::Logout,
            AuditAction::PasswordChanged,
        ] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("job_submitted"), None);
    }

    #[test]
    fn builder_defaults_to_success() {
        let entry = AuditEntryBuilder::new(AuditAction::Logout)
            .ip_address("10.0.0.1")
            .http_request("POST", "/api/auth")
            .build();

        assert!(entry.success);
        assert_eq!(entry.action, AuditAction::Logout);
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(entry.http_method.as_deref(), Some("POST"));
        assert!(entry.user_id.is_none());
    }
}
