//! SQLite schema management
//!
//! This module provides the SQLite schema definitions for the school database
//! and the manager that (re)creates them before an import.

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use tracing::debug;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 1;

/// Schema definitions for all tables in the school database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (tracks schema version and import times)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS schoolsync_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// Students keep `contact` and `address` as embedded JSON text
    pub const STUDENTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            sex TEXT NOT NULL,
            birthdate TEXT NOT NULL,
            age INTEGER NOT NULL CHECK (age >= 0),
            enroll_year INTEGER NOT NULL,
            major TEXT NOT NULL,
            class_id INTEGER NOT NULL,
            contact TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(contact)),
            address TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(address)),
            status TEXT NOT NULL DEFAULT 'Active',
            password TEXT
        );
    "#;

    pub const TEACHERS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS teachers (
            teacher_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            password TEXT NOT NULL
        );
    "#;

    pub const ADMINISTRATORS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS administrators (
            admin_id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL
        );
    "#;

    pub const COURSES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS courses (
            course_id INTEGER PRIMARY KEY,
            course_name TEXT NOT NULL UNIQUE,
            credit REAL NOT NULL CHECK (credit > 0),
            teacher_id INTEGER NOT NULL REFERENCES teachers(teacher_id)
        );
    "#;

    pub const GRADES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS grades (
            grade_id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL REFERENCES students(id),
            course_id INTEGER NOT NULL REFERENCES courses(course_id),
            score REAL CHECK (score BETWEEN 0 AND 100),
            term TEXT NOT NULL,
            UNIQUE (student_id, course_id, term)
        );
    "#;

    pub const BOTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS bots (
            user_id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL
        );
    "#;

    pub const INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_courses_teacher_id ON courses(teacher_id)",
        "CREATE INDEX IF NOT EXISTS idx_grades_course_id ON grades(course_id)",
        "CREATE INDEX IF NOT EXISTS idx_students_class_id ON students(class_id)",
    ];

    /// Tables replaced on every import, dependents before the tables they reference
    pub const REPLACED_TABLES_DROP_ORDER: &'static [&'static str] =
        &["grades", "courses", "teachers", "students"];

    /// Every table, in creation order
    pub const CREATE_ORDER: &'static [(&'static str, &'static str)] = &[
        ("students", Self::STUDENTS_TABLE),
        ("teachers", Self::TEACHERS_TABLE),
        ("courses", Self::COURSES_TABLE),
        ("grades", Self::GRADES_TABLE),
        ("administrators", Self::ADMINISTRATORS_TABLE),
        ("bots", Self::BOTS_TABLE),
    ];
}

/// Schema manager for the school database
///
/// Handles schema creation, replacement and status checks.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create all tables and indexes that don't exist yet
    pub fn initialize(&self) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin schema transaction: {}", e))?;

        self.create_all(&tx)?;

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit schema: {}", e))?;
        Ok(())
    }

    /// Drop and recreate the replaceable tables
    ///
    /// Students, teachers, courses and grades are dropped and recreated;
    /// administrators and bots are only created when missing, so their rows
    /// survive. The whole sequence runs in one transaction: on failure the
    /// previous schema and data are left as they were.
    pub fn recreate(&self) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin schema transaction: {}", e))?;

        for table in SchemaDefinitions::REPLACED_TABLES_DROP_ORDER {
            debug!("dropping table {}", table);
            tx.execute(&format!("DROP TABLE IF EXISTS {}", table), [])
                .map_err(|e| anyhow!("Failed to drop {} table: {}", table, e))?;
        }

        self.create_all(&tx)?;

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit schema: {}", e))?;
        Ok(())
    }

    fn create_all(&self, tx: &rusqlite::Transaction<'_>) -> Result<()> {
        tx.execute(SchemaDefinitions::META_TABLE, [])
            .map_err(|e| anyhow!("Failed to create meta table: {}", e))?;

        for (name, sql) in SchemaDefinitions::CREATE_ORDER {
            tx.execute(sql, [])
                .map_err(|e| anyhow!("Failed to create {} table: {}", name, e))?;
        }

        for index_sql in SchemaDefinitions::INDEXES {
            tx.execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create index: {}", e))?;
        }

        // Runs on the same connection, so it joins the open transaction
        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;

        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        if !self.table_exists("schoolsync_meta")? {
            return Ok(SchemaStatus::NotInitialized);
        }

        let version = self
            .get_meta("schema_version")?
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);

        if version != SCHEMA_VERSION {
            return Ok(SchemaStatus::VersionMismatch {
                database_version: version,
                required_version: SCHEMA_VERSION,
            });
        }

        for (table, _) in SchemaDefinitions::CREATE_ORDER {
            if !self.table_exists(table)? {
                return Ok(SchemaStatus::Incomplete);
            }
        }

        Ok(SchemaStatus::Current)
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO schoolsync_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| anyhow!("Failed to set meta value: {}", e))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM schoolsync_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get meta value: {}", e)),
        }
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Database has never been imported into
    NotInitialized,

    /// Schema is current and every table exists
    Current,

    /// Database was written by a different schema version
    VersionMismatch {
        database_version: u32,
        required_version: u32,
    },

    /// Meta table exists but some tables are missing
    Incomplete,
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Current => write!(f, "current"),
            SchemaStatus::VersionMismatch {
                database_version,
                required_version,
            } => write!(
                f,
                "version mismatch (database v{}, required v{})",
                database_version, required_version
            ),
            SchemaStatus::Incomplete => write!(f, "incomplete"),
        }
    }
}
