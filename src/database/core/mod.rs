//! Core database infrastructure
//!
//! This module provides the foundational SQLite components:
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `SchemaManager`: Schema creation, replacement and status checks
//! - `SchemaStatus`: Schema state enumeration

mod connection;
mod schema;

pub use connection::DatabaseConn;
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};
