use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::auth::authenticator::AuthError;
use crate::state::ServerState;
use crate::storage::UserProjection;

/// Custom header carrying the bearer token, alongside standard Authorization
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Authenticated user attached to the request by [`require_session`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserProjection);

/// Extract the session token from `x-session-token` or
/// `Authorization: Bearer <token>` headers
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .filter(|v| !v.is_empty())
}

/// Middleware for protected routes: verifies the bearer token against the
/// session store and rejects before any handler logic runs. The
/// authenticated user is injected as a request extension.
pub async fn require_session(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return unauthorized("Missing session token");
    };

    match state.authenticator.verify(&token).await {
        Ok(user) => {
            // A non-admin can never hold a session today, but the role gate
            // stays: a demoted account's live sessions must stop working.
            if !user.role.is_admin() {
                return forbidden();
            }
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Err(AuthError::Internal) => {
            warn!("session verification failed closed");
            server_error()
        }
        Err(_) => unauthorized("Invalid or expired session"),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "result": "error",
            "message": message
        })),
    )
        .into_response()
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "result": "error",
            "message": "Insufficient permissions"
        })),
    )
        .into_response()
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "result": "error",
            "message": "Internal server error"
        })),
    )
        .into_response()
}
