//! Core database infrastructure
//!
//! - `DatabaseConn`: SQLite connection wrapper with consistent pragmas
//! - `SchemaManager`: schema initialization, version checks and reset
//! - `SchemaStatus`: schema state enumeration

mod connection;
mod schema;

pub use connection::DatabaseConn;
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};
