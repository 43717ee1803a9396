//! Lens module
//!
//! Lenses combine the sync logic with a summary that the CLI can render as a
//! table or JSON. Each lens works against any [`crate::database::SchoolStore`].
//!
//! | Lens | Direction |
//! |------|-----------|
//! | `ImportLens` | JSON document to database |
//! | `ExportLens` | database to JSON document |
//!
//! # Usage
//!
//! ```rust,ignore
//! use schoolsync::database::SchoolDatabase;
//! use schoolsync::lens::export::ExportLens;
//!
//! let mut db = SchoolDatabase::open("school.sqlite3")?;
//! let summary = ExportLens::new(&mut db).export_to("school_database.json")?;
//! ```

pub mod export;
pub mod import;
pub mod utils;
