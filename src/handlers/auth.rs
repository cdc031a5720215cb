use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

use crate::auth::{AuthError, CurrentUser};
use crate::middleware::AuditedAction;
use crate::state::ServerState;
use crate::storage::{AuditAction, ClientMeta, UserProjection};

/// Requests accepted by the auth endpoint, dispatched on the `action` tag.
/// Anything that does not deserialize into one of these variants is rejected
/// with 400 before it reaches the authenticator.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AuthRequest {
    #[serde(rename_all = "camelCase")]
    Login { email: String, password: String },
    #[serde(rename_all = "camelCase")]
    Verify {
        #[serde(default)]
        session_token: String,
    },
    #[serde(rename_all = "camelCase")]
    Logout {
        #[serde(default)]
        session_token: String,
    },
    #[serde(rename_all = "camelCase")]
    ChangePassword {
        #[serde(default)]
        session_token: String,
        current_password: String,
        new_password: String,
    },
}

/// Login success response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub result: &'static str,
    pub message: &'static str,
    pub session_token: String,
    pub user: UserProjection,
    pub expires_at: DateTime<Utc>,
}

/// Verify success response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub result: &'static str,
    pub valid: bool,
    pub user: UserProjection,
}

/// Plain success response (logout, change password)
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub result: &'static str,
    pub message: &'static str,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub result: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl ErrorBody {
    fn new(message: impl Into<String>) -> Self {
        Self {
            result: "error",
            message: message.into(),
            valid: None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            result: "error",
            message: message.into(),
            valid: Some(false),
        }
    }
}

fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::InvalidSession => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::AccessDenied | AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &AuthError) -> Response {
    (status_for(err), Json(ErrorBody::new(err.to_string()))).into_response()
}

/// Resolve the client IP: `x-forwarded-for` first (the storefront runs
/// behind a proxy), then the socket peer address
fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| addr.ip())
}

fn client_meta(headers: &HeaderMap, ip: IpAddr) -> ClientMeta {
    ClientMeta {
        ip_address: Some(ip.to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string()),
    }
}

fn tagged(mut response: Response, tag: AuditedAction) -> Response {
    response.extensions_mut().insert(tag);
    response
}

/// The auth endpoint: one route, four typed actions
pub async fn auth_action(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<AuthRequest>,
) -> Response {
    match request {
        AuthRequest::Login { email, password } => {
            login(state, &headers, addr, email, password).await
        }
        AuthRequest::Verify { session_token } => verify(state, session_token).await,
        AuthRequest::Logout { session_token } => logout(state, session_token).await,
        AuthRequest::ChangePassword {
            session_token,
            current_password,
            new_password,
        } => change_password(state, session_token, current_password, new_password).await,
    }
}

async fn login(
    state: Arc<ServerState>,
    headers: &HeaderMap,
    addr: SocketAddr,
    email: String,
    password: String,
) -> Response {
    let ip = client_ip(headers, addr);

    if state.rate_limiter.is_limited(ip) {
        warn!(%ip, "login rate limit exceeded");
        let retry = state.rate_limiter.retry_after_seconds(ip);
        let response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new(format!(
                "Too many login attempts. Please try again in {retry} seconds."
            ))),
        )
            .into_response();
        return tagged(
            response,
            AuditedAction::for_email(AuditAction::LoginFailed, &email),
        );
    }

    let meta = client_meta(headers, ip);

    match state.authenticator.login(&email, &password, &meta).await {
        Ok(outcome) => {
            state.rate_limiter.clear(ip);
            let email = outcome.user.email.clone();
            let response = (
                StatusCode::OK,
                Json(LoginResponse {
                    result: "success",
                    message: "Login successful",
                    session_token: outcome.session_token,
                    user: outcome.user,
                    expires_at: outcome.expires_at,
                }),
            )
                .into_response();
            tagged(
                response,
                AuditedAction::for_email(AuditAction::LoginSuccess, &email),
            )
        }
        Err(err) => {
            if matches!(
                err,
                AuthError::InvalidCredentials | AuthError::AccessDenied
            ) {
                if state.rate_limiter.record_failure(ip) {
                    warn!(%ip, "IP is now rate limited after failed logins");
                }
            }
            tagged(
                error_response(&err),
                AuditedAction::for_email(AuditAction::LoginFailed, &email),
            )
        }
    }
}

async fn verify(state: Arc<ServerState>, session_token: String) -> Response {
    match state.authenticator.verify(&session_token).await {
        Ok(user) => (
            StatusCode::OK,
            Json(VerifyResponse {
                result: "success",
                valid: true,
                user,
            }),
        )
            .into_response(),
        Err(err) => (status_for(&err), Json(ErrorBody::invalid(err.to_string()))).into_response(),
    }
}

async fn logout(state: Arc<ServerState>, session_token: String) -> Response {
    let response = match state.authenticator.logout(&session_token).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                result: "success",
                message: "Logged out successfully",
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    };
    tagged(response, AuditedAction::new(AuditAction::Logout))
}

async fn change_password(
    state: Arc<ServerState>,
    session_token: String,
    current_password: String,
    new_password: String,
) -> Response {
    let response = match state
        .authenticator
        .change_password(&session_token, &current_password, &new_password)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                result: "success",
                message: "Password changed successfully",
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    };
    tagged(response, AuditedAction::new(AuditAction::PasswordChanged))
}

/// Current-user response for the protected admin surface
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub result: &'static str,
    pub user: UserProjection,
}

/// Protected endpoint returning the session's user projection.
/// `require_session` has already verified the token and role.
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<MeResponse> {
    Json(MeResponse {
        result: "success",
        user,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn login_request_parses() {
        let request: AuthRequest = serde_json::from_value(json!({
            "action": "login",
            "email": "admin@site.test",
            "password": "correct-pw"
        }))
        .unwrap();

        match request {
            AuthRequest::Login { email, password } => {
                assert_eq!(email, "admin@site.test");
                assert_eq!(password, "correct-pw");
            }
            other => panic!("parsed wrong variant: {other:?}"),
        }
    }

    #[test]
    fn change_password_request_uses_camel_case_keys() {
        let request: AuthRequest = serde_json::from_value(json!({
            "action": "changePassword",
            "sessionToken": "abc",
            "currentPassword": "old",
            "newPassword": "new"
        }))
        .unwrap();

        match request {
            AuthRequest::ChangePassword {
                session_token,
                current_password,
                new_password,
            } => {
                assert_eq!(session_token, "abc");
                assert_eq!(current_password, "old");
                assert_eq!(new_password, "new");
            }
            other => panic!("parsed wrong variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result = serde_json::from_value::<AuthRequest>(json!({
            "action": "deleteEverything"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn missing_session_token_defaults_to_empty() {
        // An absent token must flow to MissingToken (401), not a parse error
        let request: AuthRequest =
            serde_json::from_value(json!({ "action": "verify" })).unwrap();
        match request {
            AuthRequest::Verify { session_token } => assert_eq!(session_token, ""),
            other => panic!("parsed wrong variant: {other:?}"),
        }
    }

    #[test]
    fn error_statuses_match_the_wire_contract() {
        assert_eq!(
            status_for(&AuthError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_for(&AuthError::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(&AuthError::InvalidSession),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_for(&AuthError::AccessDenied), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&AuthError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&AuthError::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn verify_failure_body_carries_valid_false() {
        let body = serde_json::to_value(ErrorBody::invalid("Invalid or expired session")).unwrap();
        assert_eq!(body["result"], "error");
        assert_eq!(body["valid"], false);

        // Non-verify errors omit the field entirely
        let body = serde_json::to_value(ErrorBody::new("nope")).unwrap();
        assert!(body.get("valid").is_none());
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let addr: SocketAddr = "10.0.0.1:9999".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.7, 10.0.0.2".parse().unwrap(),
        );
        assert_eq!(
            client_ip(&headers, addr),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );

        // Garbage or absent header falls back to the peer address
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        assert_eq!(client_ip(&headers, addr), addr.ip());
        assert_eq!(client_ip(&HeaderMap::new(), addr), addr.ip());
    }
}
