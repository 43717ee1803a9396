//! Export lens
//!
//! Reads every table of a [`SchoolStore`] back into a single JSON document
//! keyed by table name. Students are reassembled into their nested form;
//! the other tables are emitted as flat rows. A table that is missing or
//! fails to read is logged and exported as an empty array, so the document
//! always carries all six keys.

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::database::catalog::{passthrough_table, EXPORT_ORDER, STUDENTS_TABLE};
use crate::database::store::SchoolStore;
use crate::student::StudentDocument;

/// Per-table export result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableExportStats {
    pub table: String,
    pub rows: usize,
    /// Read error that caused the table to be exported empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of an export run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub tables: Vec<TableExportStats>,
}

impl ExportSummary {
    /// Stats for a single table
    pub fn stats(&self, table: &str) -> Option<&TableExportStats> {
        self.tables.iter().find(|s| s.table == table)
    }

    /// Total number of rows exported
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|s| s.rows).sum()
    }
}

/// Exports a school store into a JSON document
pub struct ExportLens<'a> {
    store: &'a mut dyn SchoolStore,
}

impl<'a> ExportLens<'a> {
    pub fn new(store: &'a mut dyn SchoolStore) -> Self {
        Self { store }
    }

    /// Read every table into a document
    pub fn run(&mut self) -> (Value, ExportSummary) {
        let mut document = Map::new();
        let mut summary = ExportSummary {
            backend: self.store.backend_name().to_string(),
            output: None,
            tables: Vec::new(),
        };

        for table in EXPORT_ORDER {
            let (rows, error) = match self.read_table(table) {
                Ok(rows) => (rows, None),
                Err(e) => {
                    warn!("exporting {} as empty: {}", table, e);
                    (Vec::new(), Some(e.to_string()))
                }
            };

            summary.tables.push(TableExportStats {
                table: table.to_string(),
                rows: rows.len(),
                error,
            });
            document.insert(table.to_string(), Value::Array(rows));
        }

        info!(
            "read {} rows from {} backend",
            summary.total_rows(),
            summary.backend
        );
        (Value::Object(document), summary)
    }

    /// Read every table and write the document to `path`
    pub fn export_to(&mut self, path: impl AsRef<Path>) -> Result<ExportSummary> {
        let path = path.as_ref();
        let (document, mut summary) = self.run();
        write_document(&document, path)?;
        info!("exported school database to {}", path.display());
        summary.output = Some(path.display().to_string());
        Ok(summary)
    }

    fn read_table(&mut self, table: &str) -> Result<Vec<Value>> {
        if table == STUDENTS_TABLE {
            let students = self.store.read_students()?;
            return students
                .into_iter()
                .map(|row| {
                    serde_json::to_value(StudentDocument::from(row))
                        .map_err(|e| anyhow!("failed to serialize student: {}", e))
                })
                .collect();
        }

        let def = passthrough_table(table).ok_or_else(|| anyhow!("unknown table {}", table))?;
        Ok(self
            .store
            .read_rows(def)?
            .into_iter()
            .map(|values| Value::Object(def.row_to_json(values)))
            .collect())
    }
}

/// Write a document as pretty-printed UTF-8 JSON, creating parent directories
pub fn write_document(document: &Value, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow!("Failed to create directory {}: {}", parent.display(), e)
            })?;
        }
    }

    let content = serde_json::to_string_pretty(document)
        .map_err(|e| anyhow!("Failed to serialize document: {}", e))?;
    std::fs::write(path, content)
        .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SchoolDatabase;
    use crate::lens::import::{ImportDocument, ImportLens};
    use chrono::NaiveDate;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn import(db: &mut SchoolDatabase, doc: Value) {
        let doc = ImportDocument::from_value(doc).unwrap();
        ImportLens::new(db).with_today(today()).run(&doc).unwrap();
    }

    #[test]
    fn test_export_all_keys_on_empty_database() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        let (document, summary) = ExportLens::new(&mut db).run();

        let obj = document.as_object().unwrap();
        for table in EXPORT_ORDER {
            assert_eq!(obj.get(*table), Some(&json!([])));
        }
        // Tables were never created, so every read fails
        assert!(summary.stats("students").unwrap().error.is_some());
        assert_eq!(summary.total_rows(), 0);
    }

    #[test]
    fn test_student_round_trip() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        import(
            &mut db,
            json!([{
                "id": 1,
                "name": "Li",
                "sex": "female",
                "birthdate": {"year": 2002, "month": 3, "day": 15},
                "age": 99,
                "enrollYear": 2020,
                "major": "CS",
                "class": 3,
                "contact": {"phone": "123"},
                "address": {"city": "Wuhan"},
                "familyMembers": [{"name": "Mom"}]
            }]),
        );

        let (document, summary) = ExportLens::new(&mut db).run();
        assert_eq!(summary.stats("students").unwrap().rows, 1);
        assert_eq!(
            document["students"][0],
            json!({
                "id": 1,
                "name": "Li",
                "sex": "female",
                "birthdate": {"year": 2002, "month": 3, "day": 15},
                "age": 21,
                "enrollYear": 2020,
                "major": "CS",
                "class": 3,
                "contact": {"phone": "123", "email": null},
                "address": {"province": null, "city": "Wuhan"},
                "status": "Active",
                "familyMembers": [],
                "password": null
            })
        );
        assert_eq!(document["teachers"], json!([]));
    }

    #[test]
    fn test_sex_and_status_round_trip_unchanged() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        let base = json!({
            "name": "Li",
            "birthdate": {"year": 2002, "month": 3, "day": 15},
            "age": 21,
            "enrollYear": 2020,
            "major": "CS",
            "class": 3
        });
        let with = |id: i64, sex: &str, status: &str| {
            let mut v = base.clone();
            v["id"] = json!(id);
            v["sex"] = json!(sex);
            v["status"] = json!(status);
            v
        };
        import(
            &mut db,
            json!([with(1, "女", "在读"), with(2, "Male", "Suspended"), with(3, "male", "leave")]),
        );

        let (document, _) = ExportLens::new(&mut db).run();
        let students = document["students"].as_array().unwrap();
        assert_eq!(students.len(), 3);
        let pairs: Vec<(&str, &str)> = students
            .iter()
            .map(|s| (s["sex"].as_str().unwrap(), s["status"].as_str().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![("女", "在读"), ("Male", "Suspended"), ("male", "leave")]
        );
    }

    #[test]
    fn test_unparseable_birthdate_exports_empty_object() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        db.recreate_schema().unwrap();
        db.connection()
            .execute(
                "INSERT INTO students (id, name, sex, birthdate, age, enroll_year, major, class_id, status)
                 VALUES (5, 'Zhao', 'Male', 'not-a-date', 20, 2021, 'Math', 1, 'Active')",
                [],
            )
            .unwrap();

        let (document, _) = ExportLens::new(&mut db).run();
        assert_eq!(document["students"][0]["birthdate"], json!({}));
    }

    #[test]
    fn test_passthrough_rows_exported_unchanged() {
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        let teacher = json!({"teacher_id": 1, "name": "Wang", "password": "pw"});
        let course =
            json!({"course_id": 10, "course_name": "Databases", "credit": 3.5, "teacher_id": 1});
        let bot = json!({"user_id": 7, "username": "helper", "password": "x"});
        import(
            &mut db,
            json!({
                "teachers": [teacher.clone()],
                "courses": [course.clone()],
                "bots": [bot.clone()]
            }),
        );

        let (document, summary) = ExportLens::new(&mut db).run();
        assert_eq!(document["teachers"], json!([teacher]));
        assert_eq!(document["courses"], json!([course]));
        assert_eq!(document["bots"], json!([bot]));
        assert_eq!(document["grades"], json!([]));
        assert!(summary.stats("grades").unwrap().error.is_none());
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("school_database.json");
        let mut db = SchoolDatabase::open_in_memory().unwrap();
        db.recreate_schema().unwrap();

        let summary = ExportLens::new(&mut db).export_to(&path).unwrap();
        assert_eq!(summary.output.as_deref(), Some(path.to_str().unwrap()));

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.as_object().unwrap().len(), 6);
    }
}
