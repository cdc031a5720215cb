use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{Authenticator, LoginRateLimiter};
use crate::config::ServerConfig;
use crate::storage::{SessionStore, UserStore};

/// Main server state shared across all handlers
pub struct ServerState {
    pub config: ServerConfig,
    pub user_store: Arc<dyn UserStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub authenticator: Authenticator,
    pub rate_limiter: LoginRateLimiter,
    pub start_time: Instant,
    pub db_pool: PgPool,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        user_store: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
        db_pool: PgPool,
    ) -> Self {
        let authenticator = Authenticator::new(
            user_store.clone(),
            session_store.clone(),
            config.session_ttl_hours,
            config.sliding_sessions,
        );
        let rate_limiter =
            LoginRateLimiter::new(config.login_max_failures, config.login_window_seconds);

        Self {
            config,
            user_store,
            session_store,
            authenticator,
            rate_limiter,
            start_time: Instant::now(),
            db_pool,
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
