use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Statement, ToSql};

use crate::error::ExtDbError;
use crate::results::ResultSet;
use crate::types::{ColumnInfo, ColumnKind, RowValues};

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `ExtDbError` if the value cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, ExtDbError> {
    let value: Value = row.get(idx).map_err(ExtDbError::SqliteError)?;
    match value {
        Value::Null => Ok(RowValues::Null),
        Value::Integer(i) => Ok(RowValues::Int(i)),
        Value::Real(f) => Ok(RowValues::Float(f)),
        Value::Text(s) => Ok(RowValues::Text(s)),
        Value::Blob(b) => Ok(RowValues::Blob(b)),
    }
}

/// Build a result set from a `SQLite` statement.
///
/// DML statements run to completion and produce an empty result set. With `allow_blobs` unset,
/// any blob value fails the statement with `ExtDbError::Unsupported`.
///
/// # Errors
/// Returns `ExtDbError` if query execution or result processing fails.
pub fn build_result_set(
    stmt: &mut Statement,
    params: &[Value],
    allow_blobs: bool,
) -> Result<ResultSet, ExtDbError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let columns: Vec<ColumnInfo> = stmt
        .columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), ColumnKind::from_declared(col.decl_type())))
        .collect();
    if !allow_blobs
        && let Some(col) = columns.iter().find(|c| c.kind == ColumnKind::Blob)
    {
        return Err(ExtDbError::Unsupported(format!(
            "Field type not supported: BLOB column {}",
            col.name
        )));
    }
    let col_count = columns.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_columns(Arc::new(columns));

    let mut rows_iter = stmt.query(&param_refs[..])?;
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value = sqlite_extract_value_sync(row, i)?;
            if !allow_blobs && matches!(value, RowValues::Blob(_)) {
                return Err(ExtDbError::Unsupported(format!(
                    "Field type not supported: BLOB value in column {i}"
                )));
            }
            row_values.push(value);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}
