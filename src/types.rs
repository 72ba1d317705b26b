use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Values read back from a database row.
///
/// Backends hand rows to the template engine in this shape so output formatting does not
/// branch on driver types:
/// ```rust
/// use extdb::prelude::*;
///
/// let row = vec![RowValues::Int(1), RowValues::Text("alice".into()), RowValues::Null];
/// # let _ = row;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Render the value as the raw text the output transforms operate on.
    ///
    /// Returns `None` for NULL.
    #[must_use]
    pub fn to_field_text(&self) -> Option<String> {
        match self {
            RowValues::Int(i) => Some(i.to_string()),
            RowValues::Float(f) => Some(f.to_string()),
            RowValues::Text(s) => Some(s.clone()),
            RowValues::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
            RowValues::Null => None,
        }
    }
}

/// Column classification used when formatting output.
///
/// Derived from the declared column type, so a `DATETIME` column whose value is stored as text
/// still renders as a date array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnKind {
    #[default]
    Value,
    Date,
    DateTime,
    Time,
    Blob,
}

impl ColumnKind {
    /// Classify a declared SQL column type such as `DATETIME` or `varchar(20)`.
    #[must_use]
    pub fn from_declared(decl: Option<&str>) -> Self {
        let Some(decl) = decl else {
            return ColumnKind::Value;
        };
        let upper = decl.trim().to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();
        match base {
            "DATE" => ColumnKind::Date,
            "DATETIME" | "TIMESTAMP" => ColumnKind::DateTime,
            "TIME" => ColumnKind::Time,
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
                ColumnKind::Blob
            }
            _ => ColumnKind::Value,
        }
    }
}

/// Column metadata carried by a [`crate::results::ResultSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A positional parameter bound to a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundParam {
    Text(String),
    DateTime(NaiveDateTime),
    Null,
}

/// Parse a stored date value (`YYYY-MM-DD`, optionally followed by a time part).
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.trim().get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Parse a stored datetime value in either `YYYY-MM-DD HH:MM:SS` or ISO `T` form.
#[must_use]
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// Parse a stored time-of-day value (`HH:MM:SS`).
#[must_use]
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn declared_types_classify_case_insensitively() {
        assert_eq!(ColumnKind::from_declared(Some("datetime")), ColumnKind::DateTime);
        assert_eq!(ColumnKind::from_declared(Some("DATE")), ColumnKind::Date);
        assert_eq!(ColumnKind::from_declared(Some("Time")), ColumnKind::Time);
        assert_eq!(ColumnKind::from_declared(Some("varchar(32)")), ColumnKind::Value);
        assert_eq!(ColumnKind::from_declared(None), ColumnKind::Value);
    }

    #[test]
    fn stored_datetimes_parse_in_common_shapes() {
        let dt = parse_datetime("2024-03-05 07:08:09").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (7, 8, 9));
        assert!(parse_datetime("2024-03-05T07:08:09").is_some());
        assert!(parse_datetime("not a date").is_none());
        assert_eq!(parse_date("2024-03-05").unwrap().day(), 5);
        assert_eq!(parse_time("10:11:12").unwrap().second(), 12);
    }
}
