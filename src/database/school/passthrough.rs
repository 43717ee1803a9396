//! Passthrough table repository for the SQLite school database
//!
//! Teachers, courses, grades, administrators and bots are stored without any
//! transformation. The SQL is generated from the table's [`TableDef`].

use anyhow::{anyhow, Result};
use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::{Connection, ToSql};

use crate::database::catalog::{SqlValue, TableDef};

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(SqliteValue::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Owned(SqliteValue::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            SqlValue::Text(String::from_utf8_lossy(t).into_owned())
        }
    }
}

/// Repository for one passthrough table
pub struct PassthroughRepository<'a> {
    conn: &'a Connection,
    table: &'a TableDef,
}

impl<'a> PassthroughRepository<'a> {
    pub fn new(conn: &'a Connection, table: &'a TableDef) -> Self {
        Self { conn, table }
    }

    fn upsert_sql(&self) -> String {
        let placeholders: Vec<String> = (1..=self.table.columns.len())
            .map(|i| format!("?{}", i))
            .collect();
        let updates: Vec<String> = self
            .table
            .columns
            .iter()
            .filter(|c| c.name != self.table.primary_key)
            .map(|c| format!("{0} = excluded.{0}", c.name))
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
            self.table.name,
            self.table.column_list(),
            placeholders.join(", "),
            self.table.primary_key,
            updates.join(", ")
        )
    }

    /// Insert or overwrite a row by primary key
    pub fn upsert(&self, values: &[SqlValue]) -> Result<()> {
        if values.len() != self.table.columns.len() {
            return Err(anyhow!(
                "Expected {} values for table {}, got {}",
                self.table.columns.len(),
                self.table.name,
                values.len()
            ));
        }

        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        self.conn
            .execute(&self.upsert_sql(), params.as_slice())
            .map_err(|e| anyhow!("Failed to upsert into {}: {}", self.table.name, e))?;
        Ok(())
    }

    /// Read every row ordered by primary key
    pub fn list(&self) -> Result<Vec<Vec<SqlValue>>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            self.table.column_list(),
            self.table.name,
            self.table.primary_key
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| anyhow!("Failed to read {}: {}", self.table.name, e))?;

        let width = self.table.columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(from_value_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|e| anyhow!("Failed to read {}: {}", self.table.name, e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| anyhow!("Failed to read {} row: {}", self.table.name, e))?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::{BOTS, COURSES, TEACHERS};
    use crate::database::core::{DatabaseConn, SchemaManager};

    fn setup_test_db() -> DatabaseConn {
        let db = DatabaseConn::open_in_memory().unwrap();
        SchemaManager::new(&db.conn).initialize().unwrap();
        db
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_upsert_sql() {
        let db = setup_test_db();
        let repo = PassthroughRepository::new(&db.conn, &BOTS);
        assert_eq!(
            repo.upsert_sql(),
            "INSERT INTO bots (user_id, username, password) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET username = excluded.username, password = excluded.password"
        );
    }

    #[test]
    fn test_upsert_and_list() {
        let db = setup_test_db();
        let teachers = PassthroughRepository::new(&db.conn, &TEACHERS);
        teachers
            .upsert(&[SqlValue::Integer(2), text("Zhao"), text("pw2")])
            .unwrap();
        teachers
            .upsert(&[SqlValue::Integer(1), text("Wang"), text("pw1")])
            .unwrap();
        teachers
            .upsert(&[SqlValue::Integer(1), text("Wang Wei"), text("pw1")])
            .unwrap();

        let rows = teachers.list().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![SqlValue::Integer(1), text("Wang Wei"), text("pw1")]);
        assert_eq!(rows[1][1], text("Zhao"));
    }

    #[test]
    fn test_constraint_violation_is_error() {
        let db = setup_test_db();
        let courses = PassthroughRepository::new(&db.conn, &COURSES);
        let result = courses.upsert(&[
            SqlValue::Integer(1),
            text("Databases"),
            SqlValue::Real(3.5),
            SqlValue::Integer(99),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_width_is_error() {
        let db = setup_test_db();
        let bots = PassthroughRepository::new(&db.conn, &BOTS);
        assert!(bots.upsert(&[SqlValue::Integer(1)]).is_err());
    }
}
