mod audit;
#[cfg(test)]
pub mod memory;
mod sessions;
mod traits;
mod users;

pub use audit::{AuditAction, AuditEntry, AuditEntryBuilder, PostgresAuditStore};
pub use sessions::{ClientMeta, PostgresSessionStore, Session};
pub use traits::{AuditStore, SessionStore, StorageError, StorageResult, UserStore};
pub use users::{CreateUser, PostgresUserStore, Role, User, UserProjection};
