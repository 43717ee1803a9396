//! SQLite school database
//!
//! `SchoolDatabase` is the embedded backend: a single SQLite file holding the
//! students, teachers, administrators, courses, grades and bots tables.

mod passthrough;
mod students;

pub use passthrough::PassthroughRepository;
pub use students::StudentRepository;

use anyhow::Result;
#[cfg(test)]
use rusqlite::Connection;
use tracing::info;

use crate::database::catalog::{SqlValue, TableDef, EXPORT_ORDER};
use crate::database::core::{DatabaseConn, SchemaManager, SchemaStatus};
use crate::database::store::SchoolStore;
use crate::student::{StoredStudent, StudentRecord};

/// School database backed by SQLite
pub struct SchoolDatabase {
    db: DatabaseConn,
}

impl SchoolDatabase {
    /// Open (or create) the database file at `path`
    ///
    /// The schema is left untouched; imports recreate it explicitly and
    /// exports treat missing tables as empty.
    pub fn open(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        info!("opened SQLite school database at {}", path);
        Ok(Self { db })
    }

    /// Create an in-memory school database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        Ok(Self { db })
    }

    /// Get a reference to the underlying connection
    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.db.conn
    }

    /// Get the schema manager
    pub fn schema(&self) -> SchemaManager<'_> {
        SchemaManager::new(&self.db.conn)
    }

    /// Get the student repository
    pub fn students(&self) -> StudentRepository<'_> {
        StudentRepository::new(&self.db.conn)
    }

    /// Get the repository for a passthrough table
    pub fn table<'a>(&'a self, table: &'a TableDef) -> PassthroughRepository<'a> {
        PassthroughRepository::new(&self.db.conn, table)
    }

    /// Check the current schema status
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.schema().check_status()
    }

    /// Row count of every table, `None` for tables that don't exist
    pub fn table_counts(&self) -> Vec<(&'static str, Option<u64>)> {
        EXPORT_ORDER
            .iter()
            .map(|table| {
                let count = match self.db.table_exists(table) {
                    Ok(true) => self.db.table_count(table).ok(),
                    _ => None,
                };
                (*table, count)
            })
            .collect()
    }

    /// Close the database
    pub fn close(self) -> Result<()> {
        self.db.close()
    }
}

impl SchoolStore for SchoolDatabase {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn recreate_schema(&mut self) -> Result<()> {
        self.schema().recreate()
    }

    fn upsert_student(&mut self, record: &StudentRecord) -> Result<()> {
        self.students().upsert(record)
    }

    fn upsert_row(&mut self, table: &TableDef, values: &[SqlValue]) -> Result<()> {
        self.table(table).upsert(values)
    }

    fn read_students(&mut self) -> Result<Vec<StoredStudent>> {
        self.students().list()
    }

    fn read_rows(&mut self, table: &TableDef) -> Result<Vec<Vec<SqlValue>>> {
        self.table(table).list()
    }

    fn close(self: Box<Self>) -> Result<()> {
        (*self).close()
    }
}
