//! Table catalog shared by all backends
//!
//! The school database has a fixed set of tables. Students carry a nested
//! JSON shape and get their own mapping (see [`crate::student`]); every other
//! table is a passthrough table whose rows are stored and exported as flat
//! key-value mappings. This module describes those passthrough tables so the
//! SQLite and MySQL stores can bind and read their columns the same way.

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

/// Name of the students table
pub const STUDENTS_TABLE: &str = "students";

/// All tables, in the order they appear in an exported document
pub const EXPORT_ORDER: &[&str] = &[
    "students",
    "teachers",
    "administrators",
    "courses",
    "grades",
    "bots",
];

/// Storage type of a passthrough column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
}

/// A column of a passthrough table
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// A passthrough table definition
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    /// Primary key column, always the first entry of `columns`
    pub primary_key: &'static str,
    pub columns: &'static [ColumnDef],
    /// Whether an import drops and recreates this table
    pub replaced_on_import: bool,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind }
}

pub const TEACHERS: TableDef = TableDef {
    name: "teachers",
    primary_key: "teacher_id",
    columns: &[
        col("teacher_id", ColumnKind::Integer),
        col("name", ColumnKind::Text),
        col("password", ColumnKind::Text),
    ],
    replaced_on_import: true,
};

pub const ADMINISTRATORS: TableDef = TableDef {
    name: "administrators",
    primary_key: "admin_id",
    columns: &[
        col("admin_id", ColumnKind::Integer),
        col("username", ColumnKind::Text),
        col("password", ColumnKind::Text),
    ],
    replaced_on_import: false,
};

pub const COURSES: TableDef = TableDef {
    name: "courses",
    primary_key: "course_id",
    columns: &[
        col("course_id", ColumnKind::Integer),
        col("course_name", ColumnKind::Text),
        col("credit", ColumnKind::Real),
        col("teacher_id", ColumnKind::Integer),
    ],
    replaced_on_import: true,
};

pub const GRADES: TableDef = TableDef {
    name: "grades",
    primary_key: "grade_id",
    columns: &[
        col("grade_id", ColumnKind::Integer),
        col("student_id", ColumnKind::Integer),
        col("course_id", ColumnKind::Integer),
        col("score", ColumnKind::Real),
        col("term", ColumnKind::Text),
    ],
    replaced_on_import: true,
};

pub const BOTS: TableDef = TableDef {
    name: "bots",
    primary_key: "user_id",
    columns: &[
        col("user_id", ColumnKind::Integer),
        col("username", ColumnKind::Text),
        col("password", ColumnKind::Text),
    ],
    replaced_on_import: false,
};

/// Passthrough tables in foreign-key order: a table only references tables
/// listed before it (grades also references students, which are written
/// before any passthrough table that depends on them).
pub const PASSTHROUGH_TABLES: &[TableDef] = &[TEACHERS, COURSES, GRADES, ADMINISTRATORS, BOTS];

/// Look up a passthrough table by name
pub fn passthrough_table(name: &str) -> Option<&'static TableDef> {
    PASSTHROUGH_TABLES.iter().find(|t| t.name == name)
}

/// A backend-neutral SQL value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Convert back into a JSON value for export
    pub fn into_json(self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(i),
            // REAL columns hand back `3` as 3.0; keep whole numbers integral
            SqlValue::Real(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
            SqlValue::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s),
        }
    }
}

impl ColumnKind {
    /// Coerce a JSON value into this column's storage type
    ///
    /// `null` and absent values become [`SqlValue::Null`]; the database
    /// constraints decide whether that is acceptable.
    pub fn coerce(&self, value: Option<&Value>) -> Result<SqlValue> {
        let value = match value {
            None | Some(Value::Null) => return Ok(SqlValue::Null),
            Some(v) => v,
        };

        match self {
            ColumnKind::Integer => value
                .as_i64()
                .map(SqlValue::Integer)
                .ok_or_else(|| anyhow!("expected an integer, got {}", value)),
            ColumnKind::Real => value
                .as_f64()
                .map(SqlValue::Real)
                .ok_or_else(|| anyhow!("expected a number, got {}", value)),
            ColumnKind::Text => match value {
                Value::String(s) => Ok(SqlValue::Text(s.clone())),
                Value::Number(n) => Ok(SqlValue::Text(n.to_string())),
                other => Err(anyhow!("expected a string, got {}", other)),
            },
        }
    }
}

impl TableDef {
    /// Coerce a JSON row into column values, in column order
    ///
    /// Keys that are not columns of this table are ignored.
    pub fn row_values(&self, row: &Map<String, Value>) -> Result<Vec<SqlValue>> {
        if matches!(row.get(self.primary_key), None | Some(Value::Null)) {
            return Err(anyhow!(
                "missing primary key '{}' for table {}",
                self.primary_key,
                self.name
            ));
        }

        self.columns
            .iter()
            .map(|c| {
                c.kind
                    .coerce(row.get(c.name))
                    .map_err(|e| anyhow!("column '{}': {}", c.name, e))
            })
            .collect()
    }

    /// Comma-separated column list
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build a flat JSON row from values read in column order
    pub fn row_to_json(&self, values: Vec<SqlValue>) -> Map<String, Value> {
        self.columns
            .iter()
            .zip(values)
            .map(|(c, v)| (c.name.to_string(), v.into_json()))
            .collect()
    }
}
