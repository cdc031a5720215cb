use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::warn;

use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::auth::session::generate_session_token;
use crate::storage::{ClientMeta, SessionStore, StorageError, User, UserProjection, UserStore};

/// Errors surfaced by authenticator operations.
/// Callers must treat `Internal` as failed-closed: deny access.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Credentials were correct but the role cannot obtain a session
    #[error("Access denied: Admin only")]
    AccessDenied,

    #[error("Session token is required")]
    MissingToken,

    #[error("Invalid or expired session")]
    InvalidSession,

    /// Valid session, insufficient role for the requested operation
    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal,
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        warn!("storage error during auth operation: {err}");
        AuthError::Internal
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        warn!("password hashing error: {err}");
        AuthError::Internal
    }
}

/// Result of a successful login
#[derive(Debug)]
pub struct LoginOutcome {
    pub session_token: String,
    pub user: UserProjection,
    pub expires_at: DateTime<Utc>,
}

/// The session authenticator: verifies identities and bearer tokens, gates
/// admin-only operations. One instance per process, shared across handlers.
pub struct Authenticator {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
    sliding_sessions: bool,
}

impl Authenticator {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        session_ttl_hours: i64,
        sliding_sessions: bool,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl: Duration::hours(session_ttl_hours),
            sliding_sessions,
        }
    }

    /// Verify credentials and mint a new session.
    ///
    /// Only `admin` accounts may obtain a session through this path; the
    /// public storefront has no authenticated endpoints. Each successful
    /// login creates exactly one new session and leaves prior sessions
    /// untouched, so concurrent sessions per account are allowed.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &ClientMeta,
    ) -> Result<LoginOutcome, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = match self.users.get_user_by_email(email).await {
            Ok(user) => user,
            Err(StorageError::UserNotFound(_)) => {
                warn!("login attempt for unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(email = %user.email, "login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        // Role gate comes after the password check so that AccessDenied is
        // only ever reported for correct credentials.
        if !user.role.is_admin() {
            warn!(email = %user.email, "login attempt by non-admin account");
            return Err(AuthError::AccessDenied);
        }

        let token = generate_session_token();
        let expires_at = Utc::now() + self.session_ttl;
        self.sessions
            .create_session(user.id, &token, expires_at, meta)
            .await?;

        // Non-fatal: the session already exists, a stale last_login is
        // acceptable.
        if let Err(err) = self.users.update_last_login(user.id).await {
            warn!(email = %user.email, "failed to touch last login: {err}");
        }

        Ok(LoginOutcome {
            session_token: token,
            user: user.projection(),
            expires_at,
        })
    }

    /// Validate a bearer token, returning the owning user's public projection
    pub async fn verify(&self, token: &str) -> Result<UserProjection, AuthError> {
        Ok(self.verify_session(token).await?.projection())
    }

    /// Delete the session for a token. Idempotent: an absent or already
    /// expired token still reports success, so logout leaks nothing about
    /// token validity.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.sessions.delete_session(token).await?;
        Ok(())
    }

    /// Change the password for the account owning a valid session.
    ///
    /// Re-verifies the current password before accepting the change. Does not
    /// revoke the authorizing session or any other session for the account.
    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::Validation(
                "Missing required fields".to_string(),
            ));
        }

        let user = self.verify_session(token).await?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = hash_password(new_password)?;
        self.users.update_password(user.id, &new_hash).await?;

        Ok(())
    }

    /// Shared session lookup: unexpired row joined to its owning user.
    /// Expired rows are merely excluded here; the background sweep deletes
    /// them later.
    async fn verify_session(&self, token: &str) -> Result<User, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let Some((_session, user)) = self.sessions.find_valid(token).await? else {
            return Err(AuthError::InvalidSession);
        };

        if self.sliding_sessions {
            let refreshed = Utc::now() + self.session_ttl;
            if let Err(err) = self.sessions.touch_expiry(token, refreshed).await {
                warn!("failed to refresh session expiry: {err}");
            }
        }

        Ok(user)
    }
}
