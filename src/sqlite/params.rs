use rusqlite::types::Value;

use crate::types::BoundParam;

/// Convert a single bound parameter to a rusqlite `Value`.
///
/// Date/time parameters are stored in the `YYYY-MM-DD HH:MM:SS` text form `SQLite` date
/// functions understand.
#[must_use]
pub fn bound_param_to_sqlite_value(param: &BoundParam) -> Value {
    match param {
        BoundParam::Text(s) => Value::Text(s.clone()),
        BoundParam::DateTime(dt) => Value::Text(dt.format("%F %T").to_string()),
        BoundParam::Null => Value::Null,
    }
}

#[must_use]
pub fn convert_params(params: &[BoundParam]) -> Vec<Value> {
    params.iter().map(bound_param_to_sqlite_value).collect()
}
