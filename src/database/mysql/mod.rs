//! MySQL school database
//!
//! The networked backend. `sqlx` is async-only, so the store owns a
//! current-thread tokio runtime and blocks on each statement; the rest of the
//! crate stays synchronous.
//!
//! MySQL commits DDL implicitly, so [`SchoolStore::recreate_schema`] cannot be
//! atomic here: statements run in order and the first failure aborts.

mod schema;

pub use schema::MySqlSchemaDefinitions;

use anyhow::{anyhow, Result};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, MySql, MySqlConnection, Row};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::config::MySqlSettings;
use crate::database::catalog::{ColumnKind, SqlValue, TableDef};
use crate::database::store::SchoolStore;
use crate::student::{Address, Contact, StoredStudent, StudentRecord};

/// School database backed by a MySQL server
pub struct MySqlSchoolStore {
    rt: Runtime,
    conn: MySqlConnection,
}

impl MySqlSchoolStore {
    /// Connect to the server and select the configured database, creating it
    /// when it does not exist yet
    pub fn connect(settings: &MySqlSettings) -> Result<Self> {
        validate_identifier(&settings.database)?;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| anyhow!("Failed to start MySQL runtime: {}", e))?;

        let mut options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user);
        if let Some(password) = &settings.password {
            options = options.password(password);
        }

        let database = settings.database.clone();
        let conn = rt
            .block_on(async {
                let mut conn = options.connect().await?;
                sqlx::raw_sql(&format!("CREATE DATABASE IF NOT EXISTS `{}`", database))
                    .execute(&mut conn)
                    .await?;
                sqlx::raw_sql(&format!("USE `{}`", database))
                    .execute(&mut conn)
                    .await?;
                Ok::<_, sqlx::Error>(conn)
            })
            .map_err(|e| {
                anyhow!(
                    "Failed to connect to MySQL at {}:{} as '{}': {}",
                    settings.host,
                    settings.port,
                    settings.user,
                    e
                )
            })?;

        info!(
            "connected to MySQL database '{}' at {}:{}",
            settings.database, settings.host, settings.port
        );
        Ok(Self { rt, conn })
    }

    fn execute_raw(&mut self, sql: &str) -> Result<()> {
        let conn = &mut self.conn;
        self.rt
            .block_on(sqlx::raw_sql(sql).execute(conn))
            .map_err(|e| anyhow!("{}", e))?;
        Ok(())
    }
}

/// Database names are interpolated into DDL, so only plain identifiers pass
fn validate_identifier(name: &str) -> Result<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(anyhow!("Invalid MySQL database name '{}'", name))
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Real(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.as_str()),
    }
}

fn upsert_sql(table: &TableDef) -> String {
    let placeholders = vec!["?"; table.columns.len()].join(", ");
    let updates: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.name != table.primary_key)
        .map(|c| format!("{0} = VALUES({0})", c.name))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
        table.name,
        table.column_list(),
        placeholders,
        updates.join(", ")
    )
}

/// Integer and decimal columns are cast so they decode as `i64` / `f64`
fn select_sql(table: &TableDef) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Integer => format!("CAST({0} AS SIGNED) AS {0}", c.name),
            ColumnKind::Real => format!("CAST({0} AS DOUBLE) AS {0}", c.name),
            ColumnKind::Text => c.name.to_string(),
        })
        .collect();

    format!(
        "SELECT {} FROM {} ORDER BY {}",
        columns.join(", "),
        table.name,
        table.primary_key
    )
}

fn read_value(row: &MySqlRow, index: usize, kind: ColumnKind) -> Result<SqlValue, sqlx::Error> {
    let value = match kind {
        ColumnKind::Integer => row
            .try_get::<Option<i64>, _>(index)?
            .map(SqlValue::Integer),
        ColumnKind::Real => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Real),
        ColumnKind::Text => row.try_get::<Option<String>, _>(index)?.map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn read_student(row: &MySqlRow) -> Result<StoredStudent, sqlx::Error> {
    Ok(StoredStudent {
        id: row.try_get(0)?,
        name: row.try_get(1)?,
        sex: row.try_get(2)?,
        birthdate: row.try_get(3)?,
        age: row.try_get(4)?,
        enroll_year: row.try_get(5)?,
        major: row.try_get(6)?,
        class_id: row.try_get(7)?,
        contact: Contact {
            phone: row.try_get(8)?,
            email: row.try_get(9)?,
        },
        address: Address {
            province: row.try_get(10)?,
            city: row.try_get(11)?,
        },
        status: row.try_get(12)?,
        password: row.try_get(13)?,
    })
}

impl SchoolStore for MySqlSchoolStore {
    fn backend_name(&self) -> &'static str {
        "mysql"
    }

    fn recreate_schema(&mut self) -> Result<()> {
        for table in MySqlSchemaDefinitions::REPLACED_TABLES_DROP_ORDER {
            debug!("dropping table {}", table);
            self.execute_raw(&format!("DROP TABLE IF EXISTS {}", table))
                .map_err(|e| anyhow!("Failed to drop {} table: {}", table, e))?;
        }

        for (name, sql) in MySqlSchemaDefinitions::CREATE_ORDER {
            self.execute_raw(sql)
                .map_err(|e| anyhow!("Failed to create {} table: {}", name, e))?;
        }

        Ok(())
    }

    fn upsert_student(&mut self, record: &StudentRecord) -> Result<()> {
        let query = sqlx::query(MySqlSchemaDefinitions::UPSERT_STUDENT)
            .bind(record.id)
            .bind(record.name.as_str())
            .bind(record.sex.as_str())
            .bind(record.birthdate_string())
            .bind(record.age)
            .bind(record.enroll_year)
            .bind(record.major.as_str())
            .bind(record.class_id)
            .bind(record.contact.phone.as_deref())
            .bind(record.contact.email.as_deref())
            .bind(record.address.province.as_deref())
            .bind(record.address.city.as_deref())
            .bind(record.status.as_str())
            .bind(record.password.as_deref());

        let conn = &mut self.conn;
        self.rt
            .block_on(query.execute(conn))
            .map_err(|e| anyhow!("Failed to upsert student {}: {}", record.id, e))?;
        Ok(())
    }

    fn upsert_row(&mut self, table: &TableDef, values: &[SqlValue]) -> Result<()> {
        if values.len() != table.columns.len() {
            return Err(anyhow!(
                "Expected {} values for table {}, got {}",
                table.columns.len(),
                table.name,
                values.len()
            ));
        }

        let sql = upsert_sql(table);
        let query = values
            .iter()
            .fold(sqlx::query(&sql), |query, value| bind_value(query, value));

        let conn = &mut self.conn;
        self.rt
            .block_on(query.execute(conn))
            .map_err(|e| anyhow!("Failed to upsert into {}: {}", table.name, e))?;
        Ok(())
    }

    fn read_students(&mut self) -> Result<Vec<StoredStudent>> {
        let conn = &mut self.conn;
        let rows = self
            .rt
            .block_on(sqlx::query(MySqlSchemaDefinitions::SELECT_STUDENTS).fetch_all(conn))
            .map_err(|e| anyhow!("Failed to read students: {}", e))?;

        rows.iter()
            .map(|row| read_student(row).map_err(|e| anyhow!("Failed to read student row: {}", e)))
            .collect()
    }

    fn read_rows(&mut self, table: &TableDef) -> Result<Vec<Vec<SqlValue>>> {
        let sql = select_sql(table);
        let conn = &mut self.conn;
        let rows = self
            .rt
            .block_on(sqlx::query(&sql).fetch_all(conn))
            .map_err(|e| anyhow!("Failed to read {}: {}", table.name, e))?;

        rows.iter()
            .map(|row| {
                table
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| read_value(row, i, c.kind))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| anyhow!("Failed to read {} row: {}", table.name, e))
            })
            .collect()
    }

    fn close(self: Box<Self>) -> Result<()> {
        let MySqlSchoolStore { rt, conn } = *self;
        rt.block_on(conn.close())
            .map_err(|e| anyhow!("Failed to close MySQL connection: {}", e))?;
        info!("MySQL connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::{COURSES, TEACHERS};

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("school_management").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("school`; DROP DATABASE x").is_err());
    }

    #[test]
    fn test_upsert_sql() {
        assert_eq!(
            upsert_sql(&TEACHERS),
            "INSERT INTO teachers (teacher_id, name, password) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE name = VALUES(name), password = VALUES(password)"
        );
    }

    #[test]
    fn test_select_sql_casts_numeric_columns() {
        assert_eq!(
            select_sql(&COURSES),
            "SELECT CAST(course_id AS SIGNED) AS course_id, course_name, \
             CAST(credit AS DOUBLE) AS credit, CAST(teacher_id AS SIGNED) AS teacher_id \
             FROM courses ORDER BY course_id"
        );
    }
}
