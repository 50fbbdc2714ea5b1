//! Persistence layer: libSQL-backed storage for students, conversations,
//! the checkpoint ledger, projects and lifecycle events.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::Database;
