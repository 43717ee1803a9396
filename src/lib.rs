#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! schoolsync - move school records between JSON documents and a relational database
//!
//! schoolsync imports a JSON list of student records (or a document keyed by
//! table name) into SQLite or MySQL, and exports the database back into one
//! JSON document. It can be used as both a command-line application and a
//! library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (always) | SQLite backend, import and export lenses | `rusqlite` |
//! | `mysql` | MySQL backend | `sqlx`, `tokio` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | CLI binary | All above except `mysql` + `clap` |
//! | `full` | CLI binary with the MySQL backend | All above |
//!
//! # Architecture
//!
//! - **[`student`]**: Student records: validation, age computation, the
//!   nested JSON form
//! - **[`database`]**: Storage
//!   - `catalog`: Table definitions shared by the backends
//!   - `core`: SQLite connection management and schema definitions
//!   - `school`: The SQLite school database
//!   - `mysql`: The MySQL backend (requires `mysql`)
//! - **[`lens`]**: Import and export
//! - **[`config`]**: Configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use schoolsync::database::SchoolDatabase;
//! use schoolsync::lens::export::ExportLens;
//! use schoolsync::lens::import::{ImportDocument, ImportLens};
//!
//! let doc = ImportDocument::from_path("student_data.json")?;
//! let mut db = SchoolDatabase::open("school.sqlite3")?;
//!
//! let imported = ImportLens::new(&mut db).run(&doc)?;
//! println!("{} students written", imported.students_written());
//!
//! let exported = ExportLens::new(&mut db).export_to("school_database.json")?;
//! println!("{} rows exported", exported.total_rows());
//! ```

pub mod config;
pub mod database;
pub mod lens;
pub mod student;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{
    format_size, get_sqlite_info, Backend, MySqlSettings, SchoolSyncConfig, SqliteDatabaseInfo,
    TableInfo,
};

// =============================================================================
// Database
// =============================================================================

pub use database::{SchoolDatabase, SchoolStore, SchemaStatus};

#[cfg(feature = "mysql")]
pub use database::MySqlSchoolStore;

// =============================================================================
// Records and lenses
// =============================================================================

pub use lens::export::{ExportLens, ExportSummary};
pub use lens::import::{ImportDocument, ImportLens, ImportSummary};
pub use lens::utils::OutputFormat;
pub use student::{SkipReason, StoredStudent, StudentDocument, StudentRecord};
