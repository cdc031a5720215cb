//! In-memory store used by unit tests in place of Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::sessions::{ClientMeta, Session};
use super::traits::{SessionStore, StorageError, StorageResult, UserStore};
use super::users::{CreateUser, Role, User};

/// Implements both `UserStore` and `SessionStore` over plain maps, including
/// the user-to-session cascade on delete.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    /// Test hook: read a session's current expiry without going through verify
    pub fn session_expiry(&self, token: &str) -> Option<DateTime<Utc>> {
        self.sessions.read().get(token).map(|s| s.expires_at)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: CreateUser) -> StorageResult<User> {
        let email = user.email.to_lowercase();
        let mut users = self.users.write();

        if users.values().any(|u| u.email == email) {
            return Err(StorageError::DuplicateEmail(email));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: user.password_hash,
            role: user.role,
            full_name: user.full_name,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StorageResult<User> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::UserNotFound(id.to_string()))
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<User> {
        let needle = email.to_lowercase();
        self.users
            .read()
            .values()
            .find(|u| u.email == needle)
            .cloned()
            .ok_or_else(|| StorageError::UserNotFound(email.to_string()))
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()> {
        let mut users = self.users.write();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| StorageError::UserNotFound(id.to_string()))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> StorageResult<()> {
        let mut users = self.users.write();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| StorageError::UserNotFound(id.to_string()))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> StorageResult<()> {
        if let Some(user) = self.users.write().get_mut(&id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StorageResult<()> {
        if self.users.write().remove(&id).is_none() {
            return Err(StorageError::UserNotFound(id.to_string()));
        }
        // ON DELETE CASCADE equivalent
        self.sessions.write().retain(|_, s| s.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
        meta: &ClientMeta,
    ) -> StorageResult<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        };
        self.sessions
            .write()
            .insert(token.to_string(), session.clone());
        Ok(session)
    }

    async fn find_valid(&self, token: &str) -> StorageResult<Option<(Session, User)>> {
        let session = match self.sessions.read().get(token) {
            Some(s) if !s.is_expired() => s.clone(),
            _ => return Ok(None),
        };
        let user = match self.users.read().get(&session.user_id) {
            Some(u) => u.clone(),
            None => return Ok(None),
        };
        Ok(Some((session, user)))
    }

    async fn touch_expiry(&self, token: &str, expires_at: DateTime<Utc>) -> StorageResult<()> {
        if let Some(session) = self.sessions.write().get_mut(token) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> StorageResult<()> {
        self.sessions.write().remove(token);
        Ok(())
    }

    async fn delete_expired(&self) -> StorageResult<u64> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}
