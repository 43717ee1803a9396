//! Student repository for the SQLite school database
//!
//! `contact` and `address` are stored as embedded JSON text columns.

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use tracing::warn;

use crate::student::{Address, Contact, StoredStudent, StudentRecord};

const UPSERT_STUDENT: &str = r#"
    INSERT INTO students (
        id, name, sex, birthdate, age, enroll_year, major, class_id,
        contact, address, status, password
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        sex = excluded.sex,
        birthdate = excluded.birthdate,
        age = excluded.age,
        enroll_year = excluded.enroll_year,
        major = excluded.major,
        class_id = excluded.class_id,
        contact = excluded.contact,
        address = excluded.address,
        status = excluded.status,
        password = excluded.password
"#;

const SELECT_STUDENTS: &str = r#"
    SELECT id, name, sex, birthdate, age, enroll_year, major, class_id,
           contact, address, status, password
    FROM students
"#;

/// Repository for student rows
pub struct StudentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> StudentRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or overwrite a student by id
    pub fn upsert(&self, record: &StudentRecord) -> Result<()> {
        let contact = serde_json::to_string(&record.contact)?;
        let address = serde_json::to_string(&record.address)?;

        self.conn
            .execute(
                UPSERT_STUDENT,
                rusqlite::params![
                    record.id,
                    record.name,
                    record.sex,
                    record.birthdate_string(),
                    record.age,
                    record.enroll_year,
                    record.major,
                    record.class_id,
                    contact,
                    address,
                    record.status,
                    record.password,
                ],
            )
            .map_err(|e| anyhow!("Failed to upsert student {}: {}", record.id, e))?;
        Ok(())
    }

    /// List every student ordered by id
    pub fn list(&self) -> Result<Vec<StoredStudent>> {
        let sql = format!("{} ORDER BY id", SELECT_STUDENTS);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| anyhow!("Failed to read students: {}", e))?;

        let rows = stmt
            .query_map([], read_row)
            .map_err(|e| anyhow!("Failed to read students: {}", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| anyhow!("Failed to read student row: {}", e))?;

        Ok(rows.into_iter().map(into_stored).collect())
    }
}

// Point lookups for tests; imports and exports work on whole tables
#[cfg(test)]
impl StudentRepository<'_> {
    /// Get the number of stored students
    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to get student count: {}", e))?;
        Ok(count)
    }

    /// Look up a single student
    pub fn get(&self, id: i64) -> Result<Option<StoredStudent>> {
        let sql = format!("{} WHERE id = ?1", SELECT_STUDENTS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map([id], read_row)
            .map_err(|e| anyhow!("Failed to query student {}: {}", id, e))?;

        match rows.next() {
            Some(row) => Ok(Some(into_stored(row?))),
            None => Ok(None),
        }
    }
}

/// Raw column values, before the embedded JSON is decoded
struct RawStudent {
    student: StoredStudent,
    contact: String,
    address: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawStudent> {
    Ok(RawStudent {
        student: StoredStudent {
            id: row.get(0)?,
            name: row.get(1)?,
            sex: row.get(2)?,
            birthdate: row.get(3)?,
            age: row.get(4)?,
            enroll_year: row.get(5)?,
            major: row.get(6)?,
            class_id: row.get(7)?,
            contact: Contact::default(),
            address: Address::default(),
            status: row.get(10)?,
            password: row.get(11)?,
        },
        contact: row.get(8)?,
        address: row.get(9)?,
    })
}

fn into_stored(raw: RawStudent) -> StoredStudent {
    let mut student = raw.student;
    student.contact = serde_json::from_str(&raw.contact).unwrap_or_else(|e| {
        warn!("student {}: unreadable contact '{}': {}", student.id, raw.contact, e);
        Contact::default()
    });
    student.address = serde_json::from_str(&raw.address).unwrap_or_else(|e| {
        warn!("student {}: unreadable address '{}': {}", student.id, raw.address, e);
        Address::default()
    });
    student
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{DatabaseConn, SchemaManager};
    use chrono::NaiveDate;

    fn setup_test_db() -> DatabaseConn {
        let db = DatabaseConn::open_in_memory().unwrap();
        SchemaManager::new(&db.conn).initialize().unwrap();
        db
    }

    fn record(id: i64) -> StudentRecord {
        StudentRecord {
            id,
            name: "Li".to_string(),
            sex: "Female".to_string(),
            birthdate: NaiveDate::from_ymd_opt(2002, 3, 15).unwrap(),
            age: 21,
            enroll_year: 2020,
            major: "CS".to_string(),
            class_id: 3,
            contact: Contact {
                phone: Some("123".to_string()),
                email: None,
            },
            address: Address {
                province: Some("Zhejiang".to_string()),
                city: Some("Hangzhou".to_string()),
            },
            status: "Active".to_string(),
            password: Some("secret".to_string()),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_test_db();
        let repo = StudentRepository::new(&db.conn);
        repo.upsert(&record(1)).unwrap();

        let stored = repo.get(1).unwrap().unwrap();
        assert_eq!(stored.name, "Li");
        assert_eq!(stored.sex, "Female");
        assert_eq!(stored.birthdate.as_deref(), Some("2002-03-15"));
        assert_eq!(stored.contact.phone.as_deref(), Some("123"));
        assert_eq!(stored.address.city.as_deref(), Some("Hangzhou"));
        assert_eq!(stored.password.as_deref(), Some("secret"));
        assert!(repo.get(2).unwrap().is_none());
    }

    #[test]
    fn test_upsert_overwrites() {
        let db = setup_test_db();
        let repo = StudentRepository::new(&db.conn);
        repo.upsert(&record(1)).unwrap();

        let mut changed = record(1);
        changed.status = "毕业".to_string();
        changed.contact.email = Some("li@example.com".to_string());
        repo.upsert(&changed).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        let stored = repo.get(1).unwrap().unwrap();
        assert_eq!(stored.status, "毕业");
        assert_eq!(stored.contact.email.as_deref(), Some("li@example.com"));
    }

    #[test]
    fn test_list_ordered_by_id() {
        let db = setup_test_db();
        let repo = StudentRepository::new(&db.conn);
        repo.upsert(&record(3)).unwrap();
        repo.upsert(&record(1)).unwrap();
        repo.upsert(&record(2)).unwrap();

        let ids: Vec<i64> = repo.list().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_list_without_table_fails() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let repo = StudentRepository::new(&db.conn);
        assert!(repo.list().is_err());
    }
}
