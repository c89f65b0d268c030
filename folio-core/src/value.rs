//! Property and parameter values

use crate::error::FolioError;
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// A document property value or a query parameter.
///
/// `List` stands for both fixed arrays and collections.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(OffsetDateTime),
    List(Vec<Value>),
}

impl Value {
    /// True unless the value is null, an empty string or an empty list
    pub fn is_present(&self) -> bool {
        match self {
            Self::Null => false,
            Self::String(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parse an RFC 3339 timestamp into a date value
    pub fn parse_date(input: &str) -> crate::Result<Self> {
        OffsetDateTime::parse(input, &Rfc3339)
            .map(Self::Date)
            .map_err(|e| FolioError::InvalidDate(format!("{input}: {e}")))
    }

    /// JSON form used in search engine query bodies
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Integer(i) => serde_json::json!(i),
            Self::Float(f) => serde_json::json!(f),
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Date(d) => serde_json::Value::String(format_w3c_date_time(*d)),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
        }
    }
}

/// Formats a date as a W3C date-time in UTC, e.g. `2014-03-05T10:20:30.000Z`
pub fn format_w3c_date_time(date: OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    // The description has no component that can fail for a valid date.
    date.to_offset(UtcOffset::UTC)
        .format(&format)
        .unwrap_or_default()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Date(d) => f.write_str(&format_w3c_date_time(*d)),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(d: OffsetDateTime) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}
