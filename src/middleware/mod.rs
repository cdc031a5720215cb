mod audit;

pub use audit::{audit_middleware, AuditMiddlewareState, AuditedAction};
