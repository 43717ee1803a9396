//! Import lens
//!
//! Loads a JSON document into a [`SchoolStore`]. The schema is recreated
//! first; then each student is validated, its age recomputed, and upserted by
//! id. When the document is a mapping keyed by table name, rows of the
//! passthrough tables are upserted as well.
//!
//! Failures are split in two classes:
//! - reading the document, connecting, and recreating the schema are fatal
//!   and returned as errors;
//! - a single record that fails validation or a database constraint is
//!   logged, counted as skipped, and the batch continues.
//!
//! # Example
//!
//! ```rust,ignore
//! use schoolsync::database::SchoolDatabase;
//! use schoolsync::lens::import::{ImportDocument, ImportLens};
//!
//! let doc = ImportDocument::from_path("student_data.json")?;
//! let mut db = SchoolDatabase::open("school.sqlite3")?;
//! let summary = ImportLens::new(&mut db).run(&doc)?;
//! println!("{} students written", summary.students_written());
//! ```

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::database::catalog::{passthrough_table, TableDef, PASSTHROUGH_TABLES, STUDENTS_TABLE};
use crate::database::store::SchoolStore;
use crate::student::StudentRecord;

// =============================================================================
// Input document
// =============================================================================

/// A parsed import document
#[derive(Debug, Clone, Default)]
pub struct ImportDocument {
    /// Student records, still loosely typed
    pub students: Vec<Value>,
    /// Passthrough rows keyed by table name
    pub tables: Vec<(&'static TableDef, Vec<Value>)>,
}

impl ImportDocument {
    /// Read and parse the document at `path`
    ///
    /// A missing file or malformed JSON is an error; nothing has been
    /// written anywhere at that point.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read input file {}: {}", path.display(), e))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse JSON from {}: {}", path.display(), e))?;
        Self::from_value(value)
    }

    /// Interpret a JSON value as an import document
    ///
    /// An array is a list of students. An object maps table names to row
    /// arrays; `students` is optional and unknown keys are ignored.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(students) => Ok(ImportDocument {
                students,
                tables: Vec::new(),
            }),
            Value::Object(map) => {
                let mut doc = ImportDocument::default();
                for (key, value) in map {
                    let rows = match value {
                        Value::Array(rows) => rows,
                        other => {
                            return Err(anyhow!(
                                "Expected an array for '{}', got {}",
                                key,
                                json_type(&other)
                            ))
                        }
                    };

                    if key == STUDENTS_TABLE {
                        doc.students = rows;
                    } else if let Some(table) = passthrough_table(&key) {
                        doc.tables.push((table, rows));
                    } else {
                        warn!("ignoring unknown key '{}' in import document", key);
                    }
                }
                Ok(doc)
            }
            other => Err(anyhow!(
                "Expected a JSON array or object at the top level, got {}",
                json_type(&other)
            )),
        }
    }

    fn rows_for(&self, table: &TableDef) -> Option<&[Value]> {
        self.tables
            .iter()
            .find(|(t, _)| t.name == table.name)
            .map(|(_, rows)| rows.as_slice())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Per-table import counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableImportStats {
    pub table: String,
    pub written: usize,
    pub skipped: usize,
}

/// Result of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub backend: String,
    pub tables: Vec<TableImportStats>,
}

impl ImportSummary {
    /// Number of student records written
    pub fn students_written(&self) -> usize {
        self.stats(STUDENTS_TABLE).map(|s| s.written).unwrap_or(0)
    }

    /// Stats for a single table
    pub fn stats(&self, table: &str) -> Option<&TableImportStats> {
        self.tables.iter().find(|s| s.table == table)
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Imports JSON documents into a school store
pub struct ImportLens<'a> {
    store: &'a mut dyn SchoolStore,
    today: NaiveDate,
}

impl<'a> ImportLens<'a> {
    /// Create an import lens computing ages as of the local current date
    pub fn new(store: &'a mut dyn SchoolStore) -> Self {
        Self {
            store,
            today: Local::now().date_naive(),
        }
    }

    /// Compute ages as of `today` instead of the current date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Recreate the schema and write the document
    pub fn run(&mut self, doc: &ImportDocument) -> Result<ImportSummary> {
        info!(
            "recreating {} schema before import",
            self.store.backend_name()
        );
        self.store
            .recreate_schema()
            .map_err(|e| anyhow!("Schema setup failed: {}", e))?;

        let mut summary = ImportSummary {
            backend: self.store.backend_name().to_string(),
            tables: Vec::new(),
        };

        // Students go first: grades reference them
        summary.tables.push(self.import_students(&doc.students));

        for table in PASSTHROUGH_TABLES {
            if let Some(rows) = doc.rows_for(table) {
                summary.tables.push(self.import_rows(table, rows));
            }
        }

        info!(
            "import finished: {} of {} student records written",
            summary.students_written(),
            doc.students.len()
        );
        Ok(summary)
    }

    fn import_students(&mut self, students: &[Value]) -> TableImportStats {
        let mut stats = TableImportStats {
            table: STUDENTS_TABLE.to_string(),
            written: 0,
            skipped: 0,
        };

        for (index, value) in students.iter().enumerate() {
            let record = match StudentRecord::from_json(value, self.today) {
                Ok(record) => record,
                Err(reason) => {
                    warn!(
                        "skipping student record #{} ({}): {}",
                        index,
                        describe(value),
                        reason
                    );
                    stats.skipped += 1;
                    continue;
                }
            };

            match self.store.upsert_student(&record) {
                Ok(()) => {
                    debug!("student {} written (age {})", record.id, record.age);
                    stats.written += 1;
                }
                Err(e) => {
                    warn!("skipping student {}: {}", record.id, e);
                    stats.skipped += 1;
                }
            }
        }

        stats
    }

    fn import_rows(&mut self, table: &TableDef, rows: &[Value]) -> TableImportStats {
        let mut stats = TableImportStats {
            table: table.name.to_string(),
            written: 0,
            skipped: 0,
        };

        for (index, row) in rows.iter().enumerate() {
            let result = row
                .as_object()
                .ok_or_else(|| anyhow!("row is not a JSON object"))
                .and_then(|obj| table.row_values(obj))
                .and_then(|values| self.store.upsert_row(table, &values));

            match result {
                Ok(()) => stats.written += 1,
                Err(e) => {
                    warn!("skipping {} row #{}: {}", table.name, index, e);
                    stats.skipped += 1;
                }
            }
        }

        info!(
            "{}: {} rows written, {} skipped",
            table.name, stats.written, stats.skipped
        );
        stats
    }
}

/// Short identification of a record for log messages
fn describe(value: &Value) -> String {
    match value.get("id") {
        Some(id) => format!("id {}", id),
        None => "no id".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SchoolDatabase;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn student(id: i64) -> Value {
        json!({
            "id": id,
            "name": "Li",
            "sex": "Female",
            "birthdate": {"year": 2002, "month": 3, "day": 15},
            "age": 0,
            "enrollYear": 2020,
            "major": "CS",
            "class": 3,
            "contact": {"phone": "123"},
            "address": {},
            "status": "Active"
        })
    }

    #[test]
    fn test_document_from_array() {
        let doc = ImportDocument::from_value(json!([student(1), student(2)])).unwrap();
        assert_eq!(doc.students.len(), 2);
        assert!(doc.tables.is_empty());
    }

    #[test]
    fn test_document_from_mapping() {
        let doc = ImportDocument::from_value(json!({
            "students": [student(1)],
            "teachers": [{"teacher_id": 1, "name": "Wang", "password": "pw"}],
            "unknown": []
        }))
        .unwrap();
        assert_eq!(doc.students.len(), 1);
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].0.name, "teachers");
    }

    #[test]
    fn test_document_rejects_bad_shapes() {
        assert!(ImportDocument::from_value(json!("students")).is_err());
        assert!(ImportDocument::from_value(json!({"students": {"id": 1}})).is_err());
    }

    #[test]
    fn test_document_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.json");
        std::fs::write(&path, json!([student(1)]).to_string()).unwrap();
        assert_eq!(ImportDocument::from_path(&path).unwrap().students.len(), 1);

        assert!(ImportDocument::from_path(dir.path().join("missing.json")).is_err());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "[{\"id\": 1,").unwrap();
        assert!(ImportDocument::from_path(&broken).is_err());
    }

    #[test]
    fn test_import_skips_invalid_records() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        let mut missing_class = student(2);
        missing_class.as_object_mut().unwrap().remove("class");
        let doc = ImportDocument::from_value(json!([student(1), missing_class, "junk"])).unwrap();

        let summary = ImportLens::new(&mut db).with_today(today()).run(&doc).unwrap();
        let stats = summary.stats("students").unwrap();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(summary.backend, "sqlite");

        assert_eq!(db.students().count().unwrap(), 1);
        assert!(db.students().get(2).unwrap().is_none());
    }

    #[test]
    fn test_import_recomputes_age() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        let doc = ImportDocument::from_value(json!([student(1)])).unwrap();
        ImportLens::new(&mut db).with_today(today()).run(&doc).unwrap();

        assert_eq!(db.students().get(1).unwrap().unwrap().age, 21);
    }

    #[test]
    fn test_duplicate_ids_upsert() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        let mut changed = student(1);
        changed["status"] = json!("Leave");
        let doc = ImportDocument::from_value(json!([student(1), changed])).unwrap();

        let summary = ImportLens::new(&mut db).with_today(today()).run(&doc).unwrap();
        assert_eq!(summary.students_written(), 2);
        assert_eq!(db.students().count().unwrap(), 1);
        assert_eq!(db.students().get(1).unwrap().unwrap().status, "Leave");
    }

    #[test]
    fn test_passthrough_rows_and_constraint_failures() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        let doc = ImportDocument::from_value(json!({
            "students": [student(1)],
            "teachers": [{"teacher_id": 1, "name": "Wang", "password": "pw"}],
            "courses": [
                {"course_id": 1, "course_name": "Databases", "credit": 3.5, "teacher_id": 1},
                {"course_id": 2, "course_name": "Orphan", "credit": 2.0, "teacher_id": 9}
            ],
            "grades": [
                {"grade_id": 1, "student_id": 1, "course_id": 1, "score": 92.5, "term": "2023-1"},
                {"grade_id": 2, "student_id": 7, "course_id": 1, "score": 60.0, "term": "2023-1"},
                {"grade_id": 3, "student_id": 1, "course_id": 1, "score": 101.0, "term": "2023-2"}
            ]
        }))
        .unwrap();

        let summary = ImportLens::new(&mut db).with_today(today()).run(&doc).unwrap();
        let courses = summary.stats("courses").unwrap();
        assert_eq!((courses.written, courses.skipped), (1, 1));
        let grades = summary.stats("grades").unwrap();
        assert_eq!((grades.written, grades.skipped), (1, 2));
        assert!(summary.stats("bots").is_none());
    }

    #[test]
    fn test_reimport_preserves_administrators() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        let first = ImportDocument::from_value(json!({
            "students": [student(1)],
            "administrators": [{"admin_id": 1, "username": "root", "password": "pw"}]
        }))
        .unwrap();
        ImportLens::new(&mut db).with_today(today()).run(&first).unwrap();

        let second = ImportDocument::from_value(json!([student(2)])).unwrap();
        ImportLens::new(&mut db).with_today(today()).run(&second).unwrap();

        let counts = db.table_counts();
        assert!(counts.contains(&("administrators", Some(1))));
        assert!(counts.contains(&("students", Some(1))));
        assert!(db.students().get(1).unwrap().is_none());
    }
}
