//! Backend-neutral store interface
//!
//! Import and export only talk to a [`SchoolStore`]; the SQLite database and
//! the optional MySQL backend both implement it.

use anyhow::Result;

use crate::database::catalog::{SqlValue, TableDef};
use crate::student::{StoredStudent, StudentRecord};

/// A relational store holding the school tables
pub trait SchoolStore {
    /// Short backend name for log messages
    fn backend_name(&self) -> &'static str;

    /// Drop and recreate the replaceable tables, creating the preserved ones
    /// (administrators, bots) only when missing
    fn recreate_schema(&mut self) -> Result<()>;

    /// Insert a student, or overwrite every column of the student with the same id
    fn upsert_student(&mut self, record: &StudentRecord) -> Result<()>;

    /// Insert a passthrough row, or overwrite the row with the same primary key
    ///
    /// `values` are in the column order of `table`.
    fn upsert_row(&mut self, table: &TableDef, values: &[SqlValue]) -> Result<()>;

    /// Read every student, ordered by id
    fn read_students(&mut self) -> Result<Vec<StoredStudent>>;

    /// Read every row of a passthrough table, in column order, ordered by primary key
    fn read_rows(&mut self, table: &TableDef) -> Result<Vec<Vec<SqlValue>>>;

    /// Release the connection
    fn close(self: Box<Self>) -> Result<()>;
}
