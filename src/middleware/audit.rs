use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

use crate::storage::{AuditAction, AuditEntryBuilder, AuditStore};

/// Attached to responses by handlers whose request should be audited.
/// All auth actions share one route, so the action cannot be derived from
/// the path; the handler names it instead.
#[derive(Debug, Clone)]
pub struct AuditedAction {
    pub action: AuditAction,
    pub user_email: Option<String>,
}

impl AuditedAction {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            user_email: None,
        }
    }

    pub fn for_email(action: AuditAction, email: &str) -> Self {
        Self {
            action,
            user_email: Some(email.to_string()),
        }
    }
}

/// State for the audit middleware
#[derive(Clone)]
pub struct AuditMiddlewareState {
    pub audit_store: Arc<dyn AuditStore>,
}

/// Audit middleware that records auth events after the response is produced
pub async fn audit_middleware(
    State(state): State<AuditMiddlewareState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let ip_address = addr.ip().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let response = next.run(request).await;

    let Some(tag) = response.extensions().get::<AuditedAction>().cloned() else {
        return response;
    };

    let status = response.status();
    let mut builder = AuditEntryBuilder::new(tag.action)
        .ip_address(&ip_address)
        .http_request(&method, &path)
        .http_status(status.as_u16() as i32)
        .success(status.is_success());

    if let Some(email) = tag.user_email {
        builder = builder.user_email(&email);
    }
    if let Some(ua) = user_agent {
        builder = builder.user_agent(&ua);
    }

    let entry = builder.build();

    // Fire and forget: auditing never blocks or fails the response
    let audit_store = state.audit_store.clone();
    tokio::spawn(async move {
        if let Err(e) = audit_store.log(entry).await {
            error!("failed to write audit entry: {e}");
        }
    });

    response
}
