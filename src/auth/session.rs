use chrono::{Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Generate a secure random session token (64 hex characters, 256 bits)
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Rate limiter for login attempts.
/// Uses a sliding window to track failed attempts per client IP.
pub struct LoginRateLimiter {
    /// Failed attempts: IP -> list of attempt timestamps
    attempts: Arc<RwLock<HashMap<IpAddr, Vec<chrono::DateTime<Utc>>>>>,
    /// Maximum failed attempts in the window
    max_attempts: u32,
    /// Window duration in seconds
    window_seconds: i64,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: u32, window_seconds: i64) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window_seconds,
        }
    }

    /// Record a failed login attempt.
    /// Returns true if the IP is now rate limited.
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.window_seconds);

        let mut attempts = self.attempts.write();
        let ip_attempts = attempts.entry(ip).or_default();

        ip_attempts.retain(|ts| *ts > window_start);
        ip_attempts.push(now);

        ip_attempts.len() as u32 >= self.max_attempts
    }

    /// Check if an IP is currently rate limited
    pub fn is_limited(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.window_seconds);

        let attempts = self.attempts.read();
        match attempts.get(&ip) {
            Some(ip_attempts) => {
                let recent = ip_attempts.iter().filter(|ts| **ts > window_start).count();
                recent as u32 >= self.max_attempts
            }
            None => false,
        }
    }

    /// Seconds until the oldest in-window attempt ages out, for Retry-After hints
    pub fn retry_after_seconds(&self, ip: IpAddr) -> i64 {
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.window_seconds);

        let attempts = self.attempts.read();
        attempts
            .get(&ip)
            .and_then(|ip_attempts| ip_attempts.iter().filter(|ts| **ts > window_start).min())
            .map(|oldest| (*oldest + Duration::seconds(self.window_seconds) - now).num_seconds())
            .filter(|secs| *secs > 0)
            .unwrap_or(0)
    }

    /// Clear the window for an IP (call on successful login)
    pub fn clear(&self, ip: IpAddr) {
        self.attempts.write().remove(&ip);
    }

    /// Drop IPs with no recent attempts (call periodically)
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.window_seconds);

        let mut attempts = self.attempts.write();
        let before = attempts.len();

        attempts.retain(|_, ip_attempts| {
            ip_attempts.retain(|ts| *ts > window_start);
            !ip_attempts.is_empty()
        });

        before - attempts.len()
    }
}

impl Clone for LoginRateLimiter {
    fn clone(&self) -> Self {
        Self {
            attempts: Arc::clone(&self.attempts),
            max_attempts: self.max_attempts,
            window_seconds: self.window_seconds,
        }
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        // 10 failed attempts per minute
        Self::new(10, 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_session_token();

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_session_token(), generate_session_token());
    }

    #[test]
    fn limiter_trips_at_max_attempts() {
        let limiter = LoginRateLimiter::new(3, 60);
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        assert!(!limiter.is_limited(ip));
        assert!(!limiter.record_failure(ip));
        assert!(!limiter.record_failure(ip));

        assert!(limiter.record_failure(ip));
        assert!(limiter.is_limited(ip));
        assert!(limiter.retry_after_seconds(ip) > 0);
    }

    #[test]
    fn clear_resets_the_window() {
        let limiter = LoginRateLimiter::new(2, 60);
        let ip: IpAddr = "192.168.1.2".parse().unwrap();

        limiter.record_failure(ip);
        limiter.record_failure(ip);
        assert!(limiter.is_limited(ip));

        limiter.clear(ip);
        assert!(!limiter.is_limited(ip));
        assert_eq!(limiter.retry_after_seconds(ip), 0);
    }

    #[test]
    fn limiter_is_per_ip() {
        let limiter = LoginRateLimiter::new(2, 60);
        let ip1: IpAddr = "192.168.1.1".parse().unwrap();
        let ip2: IpAddr = "192.168.1.2".parse().unwrap();

        limiter.record_failure(ip1);
        limiter.record_failure(ip1);
        assert!(limiter.is_limited(ip1));
        assert!(!limiter.is_limited(ip2));
    }
}
