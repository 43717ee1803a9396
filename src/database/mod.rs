//! Database module
//!
//! All storage for schoolsync, organized into:
//!
//! - **catalog**: table and column descriptions shared by every backend
//! - **core**: SQLite connection wrapper and schema management
//! - **school**: the SQLite school database and its repositories
//! - **mysql**: the MySQL backend (`mysql` feature)
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── catalog         # Passthrough table definitions, SqlValue
//! ├── store           # SchoolStore trait
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # SQLite schema definitions and management
//! ├── school/         # SQLite backend
//! │   ├── students    # Student rows, contact/address as JSON text
//! │   └── passthrough # Teachers, courses, grades, administrators, bots
//! └── mysql/          # MySQL backend
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use schoolsync::database::{SchoolDatabase, SchoolStore};
//!
//! let mut db = SchoolDatabase::open("~/.schoolsync/school.sqlite3")?;
//! db.recreate_schema()?;
//! let students = db.read_students()?;
//! ```

pub mod catalog;
pub mod core;
pub mod school;
pub mod store;

#[cfg(feature = "mysql")]
pub mod mysql;

pub use catalog::{ColumnDef, ColumnKind, SqlValue, TableDef, EXPORT_ORDER, PASSTHROUGH_TABLES};
pub use core::{DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};
pub use school::{PassthroughRepository, SchoolDatabase, StudentRepository};
pub use store::SchoolStore;

#[cfg(feature = "mysql")]
pub use mysql::MySqlSchoolStore;
