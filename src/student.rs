//! Student records
//!
//! Students are the one table with real shape reconciliation: the JSON
//! interchange form nests `birthdate`, `contact` and `address` as objects,
//! while the database stores a date column and flattened contact/address
//! fields. This module owns both directions of that mapping:
//!
//! - [`StudentRecord::from_json`] validates a loosely-typed JSON record and
//!   produces a storage-ready record, recomputing `age` from `birthdate`.
//! - [`StudentDocument::from`] turns a row read back from the database into
//!   the nested JSON form used for export.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fields every student record must carry, in positional order
pub const REQUIRED_FIELDS: [&str; 8] = [
    "id",
    "name",
    "sex",
    "birthdate",
    "age",
    "enrollYear",
    "major",
    "class",
];

/// Defaults used for missing `birthdate` sub-fields
pub const DEFAULT_BIRTH_YEAR: i32 = 2000;
pub const DEFAULT_BIRTH_MONTH: u32 = 1;
pub const DEFAULT_BIRTH_DAY: u32 = 1;

/// Date format used for the stored `birthdate` column
pub const BIRTHDATE_FORMAT: &str = "%Y-%m-%d";

/// `status` stored for records that carry none
pub const DEFAULT_STATUS: &str = "Active";

// =============================================================================
// Nested objects
// =============================================================================

/// Contact information, both fields optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Home address, both fields optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl Contact {
    fn from_json(value: Option<&Value>) -> Self {
        let obj = value.and_then(Value::as_object);
        Contact {
            phone: obj.and_then(|o| loose_string(o.get("phone"))),
            email: obj.and_then(|o| loose_string(o.get("email"))),
        }
    }
}

impl Address {
    fn from_json(value: Option<&Value>) -> Self {
        let obj = value.and_then(Value::as_object);
        Address {
            province: obj.and_then(|o| loose_string(o.get("province"))),
            city: obj.and_then(|o| loose_string(o.get("city"))),
        }
    }
}

/// Strings pass through, numbers are rendered, anything else is dropped
fn loose_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `birthdate` as it appears in the JSON interchange form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdateObject {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl From<NaiveDate> for BirthdateObject {
    fn from(date: NaiveDate) -> Self {
        BirthdateObject {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

// =============================================================================
// Import side
// =============================================================================

/// Why a student record was left out of an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The record is not a JSON object
    NotAnObject,
    /// One of the required fields is absent or null
    MissingField(&'static str),
    /// A field is present but has the wrong type or an invalid value
    InvalidField { field: &'static str, reason: String },
    /// The birthdate lies after the date the age is computed for
    FutureBirthdate(NaiveDate),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "record is not a JSON object"),
            SkipReason::MissingField(field) => write!(f, "missing required field '{}'", field),
            SkipReason::InvalidField { field, reason } => {
                write!(f, "invalid field '{}': {}", field, reason)
            }
            SkipReason::FutureBirthdate(date) => {
                write!(f, "birthdate {} is in the future", date)
            }
        }
    }
}

impl std::error::Error for SkipReason {}

fn invalid(field: &'static str, reason: impl Into<String>) -> SkipReason {
    SkipReason::InvalidField {
        field,
        reason: reason.into(),
    }
}

/// A validated student, ready to be written to a store
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub id: i64,
    pub name: String,
    /// Stored as given, e.g. `Female` or `女`
    pub sex: String,
    pub birthdate: NaiveDate,
    pub age: u32,
    pub enroll_year: i64,
    pub major: String,
    pub class_id: i64,
    pub contact: Contact,
    pub address: Address,
    /// Stored as given; an open set such as `Active`, `Leave`, `在读`
    pub status: String,
    pub password: Option<String>,
}

impl StudentRecord {
    /// Validate a loosely-typed JSON record
    ///
    /// `today` is the date `age` is computed for. Any `age` value carried by
    /// the record is ignored.
    pub fn from_json(value: &Value, today: NaiveDate) -> Result<Self, SkipReason> {
        let obj = value.as_object().ok_or(SkipReason::NotAnObject)?;

        for field in REQUIRED_FIELDS {
            if matches!(obj.get(field), None | Some(Value::Null)) {
                return Err(SkipReason::MissingField(field));
            }
        }

        let id = required_i64(obj, "id")?;
        let name = required_str(obj, "name")?;
        let sex = non_empty(required_str(obj, "sex")?, "sex")?;
        let birthdate = parse_birthdate(&obj["birthdate"])?;
        let age = age_on(birthdate, today).ok_or(SkipReason::FutureBirthdate(birthdate))?;
        let enroll_year = required_i64(obj, "enrollYear")?;
        let major = required_str(obj, "major")?;
        let class_id = required_i64(obj, "class")?;

        let status = match obj.get("status") {
            None | Some(Value::Null) => DEFAULT_STATUS.to_string(),
            Some(Value::String(s)) => non_empty(s.clone(), "status")?,
            Some(other) => return Err(invalid("status", format!("expected a string, got {}", other))),
        };

        let password = match obj.get("password") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(invalid(
                    "password",
                    format!("expected a string, got {}", other),
                ))
            }
        };

        Ok(StudentRecord {
            id,
            name,
            sex,
            birthdate,
            age,
            enroll_year,
            major,
            class_id,
            contact: Contact::from_json(obj.get("contact")),
            address: Address::from_json(obj.get("address")),
            status,
            password,
        })
    }

    /// The birthdate as stored in the database
    pub fn birthdate_string(&self) -> String {
        self.birthdate.format(BIRTHDATE_FORMAT).to_string()
    }
}

fn required_i64(obj: &Map<String, Value>, field: &'static str) -> Result<i64, SkipReason> {
    obj[field]
        .as_i64()
        .ok_or_else(|| invalid(field, format!("expected an integer, got {}", obj[field])))
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, SkipReason> {
    obj[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(field, format!("expected a string, got {}", obj[field])))
}

fn non_empty(value: String, field: &'static str) -> Result<String, SkipReason> {
    if value.trim().is_empty() {
        Err(invalid(field, "must not be empty"))
    } else {
        Ok(value)
    }
}

/// Parse a `birthdate` value
///
/// Accepts the nested `{year, month, day}` form, with missing sub-fields
/// defaulting to 2000-01-01, or a `YYYY-MM-DD` string.
pub fn parse_birthdate(value: &Value) -> Result<NaiveDate, SkipReason> {
    match value {
        Value::Object(obj) => {
            let part = |key: &'static str, default: i64| -> Result<i64, SkipReason> {
                match obj.get(key) {
                    None | Some(Value::Null) => Ok(default),
                    Some(v) => v.as_i64().ok_or_else(|| {
                        invalid("birthdate", format!("{} must be an integer, got {}", key, v))
                    }),
                }
            };
            let year = part("year", DEFAULT_BIRTH_YEAR as i64)?;
            let month = part("month", DEFAULT_BIRTH_MONTH as i64)?;
            let day = part("day", DEFAULT_BIRTH_DAY as i64)?;

            let date = match (i32::try_from(year), u32::try_from(month), u32::try_from(day)) {
                (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d),
                _ => None,
            };
            date.ok_or_else(|| {
                invalid(
                    "birthdate",
                    format!("{}-{}-{} is not a calendar date", year, month, day),
                )
            })
        }
        Value::String(s) => NaiveDate::parse_from_str(s, BIRTHDATE_FORMAT)
            .map_err(|e| invalid("birthdate", format!("'{}': {}", s, e))),
        other => Err(invalid(
            "birthdate",
            format!("expected an object, got {}", other),
        )),
    }
}

/// Age in whole years on `today`
///
/// One year is subtracted when `today` falls before the birthday in the
/// current year. Returns `None` for a birthdate after `today`.
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birthdate > today {
        return None;
    }
    let mut years = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

// =============================================================================
// Export side
// =============================================================================

/// A student row as read back from a store
///
/// Values are kept loose so rows that no longer satisfy the import rules
/// can still be exported.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredStudent {
    pub id: i64,
    pub name: String,
    pub sex: String,
    pub birthdate: Option<String>,
    pub age: i64,
    pub enroll_year: i64,
    pub major: String,
    pub class_id: i64,
    pub contact: Contact,
    pub address: Address,
    pub status: String,
    pub password: Option<String>,
}

/// A student in the nested JSON interchange form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDocument {
    pub id: i64,
    pub name: String,
    pub sex: String,
    /// `{year, month, day}`, or `{}` when the stored date is unusable
    pub birthdate: Value,
    pub age: i64,
    pub enroll_year: i64,
    pub major: String,
    #[serde(rename = "class")]
    pub class_id: i64,
    pub contact: Contact,
    pub address: Address,
    pub status: String,
    pub family_members: Vec<Value>,
    pub password: Option<String>,
}

impl From<StoredStudent> for StudentDocument {
    fn from(row: StoredStudent) -> Self {
        let birthdate = row
            .birthdate
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, BIRTHDATE_FORMAT).ok())
            .and_then(|d| serde_json::to_value(BirthdateObject::from(d)).ok())
            .unwrap_or_else(|| Value::Object(Map::new()));

        StudentDocument {
            id: row.id,
            name: row.name,
            sex: row.sex,
            birthdate,
            age: row.age,
            enroll_year: row.enroll_year,
            major: row.major,
            class_id: row.class_id,
            contact: row.contact,
            address: row.address,
            status: row.status,
            family_members: Vec::new(),
            password: row.password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Value {
        json!({
            "id": 1,
            "name": "Li",
            "sex": "Female",
            "birthdate": {"year": 2002, "month": 3, "day": 15},
            "age": 99,
            "enrollYear": 2020,
            "major": "CS",
            "class": 3,
            "contact": {"phone": "123"},
            "address": {},
            "status": "Active"
        })
    }

    #[test]
    fn test_age_before_birthday() {
        assert_eq!(age_on(date(2002, 3, 15), date(2024, 3, 1)), Some(21));
    }

    #[test]
    fn test_age_on_and_after_birthday() {
        assert_eq!(age_on(date(2002, 3, 15), date(2024, 3, 15)), Some(22));
        assert_eq!(age_on(date(2002, 3, 15), date(2024, 12, 31)), Some(22));
    }

    #[test]
    fn test_age_leap_day() {
        assert_eq!(age_on(date(2004, 2, 29), date(2023, 2, 28)), Some(18));
        assert_eq!(age_on(date(2004, 2, 29), date(2023, 3, 1)), Some(19));
    }

    #[test]
    fn test_age_future_birthdate() {
        assert_eq!(age_on(date(2030, 1, 1), date(2024, 1, 1)), None);
        assert_eq!(age_on(date(2024, 1, 1), date(2024, 1, 1)), Some(0));
    }

    #[test]
    fn test_from_json_recomputes_age() {
        let record = StudentRecord::from_json(&sample(), date(2024, 3, 1)).unwrap();
        assert_eq!(record.age, 21);
        assert_eq!(record.sex, "Female");
        assert_eq!(record.birthdate_string(), "2002-03-15");
        assert_eq!(record.contact.phone.as_deref(), Some("123"));
        assert_eq!(record.contact.email, None);
        assert_eq!(record.address, Address::default());
        assert_eq!(record.status, "Active");
        assert_eq!(record.password, None);
    }

    #[test]
    fn test_from_json_missing_fields() {
        let today = date(2024, 3, 1);
        for field in REQUIRED_FIELDS {
            let mut value = sample();
            value.as_object_mut().unwrap().remove(field);
            assert_eq!(
                StudentRecord::from_json(&value, today),
                Err(SkipReason::MissingField(field))
            );
        }

        let mut value = sample();
        value["major"] = Value::Null;
        assert_eq!(
            StudentRecord::from_json(&value, today),
            Err(SkipReason::MissingField("major"))
        );
    }

    #[test]
    fn test_from_json_invalid_values() {
        let today = date(2024, 3, 1);

        let mut value = sample();
        value["id"] = json!("one");
        assert!(matches!(
            StudentRecord::from_json(&value, today),
            Err(SkipReason::InvalidField { field: "id", .. })
        ));

        let mut value = sample();
        value["sex"] = json!(" ");
        assert!(matches!(
            StudentRecord::from_json(&value, today),
            Err(SkipReason::InvalidField { field: "sex", .. })
        ));

        let mut value = sample();
        value["birthdate"] = json!({"year": 2002, "month": 2, "day": 30});
        assert!(matches!(
            StudentRecord::from_json(&value, today),
            Err(SkipReason::InvalidField {
                field: "birthdate",
                ..
            })
        ));

        let mut value = sample();
        value["birthdate"] = json!({"year": 2030});
        assert_eq!(
            StudentRecord::from_json(&value, today),
            Err(SkipReason::FutureBirthdate(date(2030, 1, 1)))
        );

        assert_eq!(
            StudentRecord::from_json(&json!([1, 2]), today),
            Err(SkipReason::NotAnObject)
        );
    }

    #[test]
    fn test_birthdate_defaults() {
        assert_eq!(parse_birthdate(&json!({})).unwrap(), date(2000, 1, 1));
        assert_eq!(
            parse_birthdate(&json!({"year": 1999})).unwrap(),
            date(1999, 1, 1)
        );
        assert_eq!(
            parse_birthdate(&json!({"month": 6, "day": 2})).unwrap(),
            date(2000, 6, 2)
        );
        assert_eq!(
            parse_birthdate(&json!("2001-09-30")).unwrap(),
            date(2001, 9, 30)
        );
        assert!(parse_birthdate(&json!(20010930)).is_err());
    }

    #[test]
    fn test_sex_and_status_kept_as_given() {
        let today = date(2024, 3, 1);

        let mut value = sample();
        value["sex"] = json!("女");
        value["status"] = json!("在读");
        let record = StudentRecord::from_json(&value, today).unwrap();
        assert_eq!(record.sex, "女");
        assert_eq!(record.status, "在读");

        value["sex"] = json!("female");
        value["status"] = json!("Suspended");
        let record = StudentRecord::from_json(&value, today).unwrap();
        assert_eq!(record.sex, "female");
        assert_eq!(record.status, "Suspended");

        value.as_object_mut().unwrap().remove("status");
        let record = StudentRecord::from_json(&value, today).unwrap();
        assert_eq!(record.status, DEFAULT_STATUS);

        value["status"] = json!(3);
        assert!(matches!(
            StudentRecord::from_json(&value, today),
            Err(SkipReason::InvalidField { field: "status", .. })
        ));
    }

    #[test]
    fn test_document_from_stored() {
        let stored = StoredStudent {
            id: 1,
            name: "Li".to_string(),
            sex: "Female".to_string(),
            birthdate: Some("2002-03-15".to_string()),
            age: 21,
            enroll_year: 2020,
            major: "CS".to_string(),
            class_id: 3,
            contact: Contact {
                phone: Some("123".to_string()),
                email: None,
            },
            address: Address::default(),
            status: "Active".to_string(),
            password: None,
        };

        let doc = serde_json::to_value(StudentDocument::from(stored.clone())).unwrap();
        assert_eq!(doc["birthdate"], json!({"year": 2002, "month": 3, "day": 15}));
        assert_eq!(doc["contact"], json!({"phone": "123", "email": null}));
        assert_eq!(doc["address"], json!({"province": null, "city": null}));
        assert_eq!(doc["enrollYear"], json!(2020));
        assert_eq!(doc["class"], json!(3));
        assert_eq!(doc["familyMembers"], json!([]));

        let unparseable = StoredStudent {
            birthdate: Some("not a date".to_string()),
            ..stored.clone()
        };
        let doc = serde_json::to_value(StudentDocument::from(unparseable)).unwrap();
        assert_eq!(doc["birthdate"], json!({}));

        let absent = StoredStudent {
            birthdate: None,
            ..stored
        };
        let doc = serde_json::to_value(StudentDocument::from(absent)).unwrap();
        assert_eq!(doc["birthdate"], json!({}));
    }
}
