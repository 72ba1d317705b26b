use chrono::{Datelike, Timelike};

use crate::error::ExtDbError;
use crate::reply;
use crate::results::ResultSet;
use crate::types::{ColumnKind, RowValues, parse_date, parse_datetime, parse_time};

use super::definition::CallDefinition;
use super::options::FieldOption;

/// Render a date/time column value as `[Y,M,D]`, `[Y,M,D,h,m,s]` or `[h,m,s]`; unparseable
/// values render as `[]`. Returns `None` for non-temporal columns.
pub(crate) fn temporal_literal(kind: ColumnKind, text: &str) -> Option<String> {
    let rendered = match kind {
        ColumnKind::Date => {
            parse_date(text).map(|d| format!("[{},{},{}]", d.year(), d.month(), d.day()))
        }
        ColumnKind::DateTime => parse_datetime(text).map(|dt| {
            format!(
                "[{},{},{},{},{},{}]",
                dt.year(),
                dt.month(),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second()
            )
        }),
        ColumnKind::Time => {
            parse_time(text).map(|t| format!("[{},{},{}]", t.hour(), t.minute(), t.second()))
        }
        ColumnKind::Value | ColumnKind::Blob => return None,
    };
    Some(rendered.unwrap_or_else(|| "[]".to_string()))
}

fn format_field(
    call: &CallDefinition,
    option: &FieldOption,
    kind: ColumnKind,
    value: &RowValues,
) -> Result<String, ExtDbError> {
    let Some(text) = value.to_field_text() else {
        return option.transform_output(None, &call.settings.strip);
    };
    match temporal_literal(kind, &text) {
        Some(literal) => Ok(literal),
        None => option.transform_output(Some(&text), &call.settings.strip),
    }
}

/// Render the final result set of a call as its success reply.
///
/// # Errors
/// Propagates output transform failures (strip rejections, beguid conversion errors).
pub(super) fn format_result(call: &CallDefinition, result: &ResultSet) -> Result<String, ExtDbError> {
    let default_option = FieldOption::default();
    let mut rows = Vec::with_capacity(result.len());
    for row in &result.results {
        let mut fields = Vec::with_capacity(row.len());
        for (idx, value) in row.iter().enumerate() {
            let kind = result
                .columns()
                .get(idx)
                .map(|c| c.kind)
                .unwrap_or_default();
            let option = call.outputs.get(idx).unwrap_or(&default_option);
            fields.push(format_field(call, option, kind, value)?);
        }
        rows.push(fields);
    }
    let rows = reply::rows_literal(&rows);
    let settings = &call.settings;
    let payload = if settings.return_insert_id {
        format!("[{},{rows}]", result.insert_id)
    } else if settings.return_insert_id_string {
        format!("[\"{}\",{rows}]", result.insert_id)
    } else {
        rows
    };
    Ok(reply::success(&payload))
}
