mod authenticator;
mod middleware;
mod password;
mod session;

pub use authenticator::{AuthError, Authenticator, LoginOutcome};
pub use middleware::{bearer_token, require_session, CurrentUser, SESSION_TOKEN_HEADER};
pub use password::{hash_password, verify_password, PasswordError};
pub use session::{generate_session_token, LoginRateLimiter};
