//! Audit domain - append-only trail of privileged actions
//!
//! Records are written by the authorization gateway after a permit and by the
//! role store for every grant/revoke. Only `record` and `query` exist; there is
//! no update or delete path.

pub mod errors;
pub mod filter;
pub mod models;
pub mod store;

pub use errors::AuditError;
pub use filter::{AuditFilter, TimeRange};
pub use models::{AuditRecord, NewAuditEntry, ResourceRef};
pub use store::PostgresAuditLog;
