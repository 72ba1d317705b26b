//! Array-literal replies returned across the command boundary.
//!
//! Every reply is text: `[1,...]` for success, `[0,"..."]` for failure, `[2,"<handle>"]` for a
//! stored result, `[3]` while a result is still computing and `[5]` when a stored result is too
//! large for single-part retrieval.

use crate::error::ExtDbError;

pub const OK: &str = "[1]";
pub const FAILED: &str = "[0]";
pub const COMPUTING: &str = "[3]";
pub const TOO_LARGE: &str = "[5]";

pub const INVALID_MESSAGE: &str = r#"[0,"Error Invalid Message"]"#;
pub const INVALID_FORMAT: &str = r#"[0,"Error Invalid Format"]"#;
pub const UNKNOWN_PROTOCOL: &str = r#"[0,"Error Unknown Protocol"]"#;
pub const PROTOCOL_NAME_TAKEN: &str = r#"[0,"Error Protocol Name Already Taken"]"#;
pub const FAILED_TO_LOAD_PROTOCOL: &str = r#"[0,"Failed to Load Protocol"]"#;
pub const ALREADY_CONNECTED: &str = r#"[0,"Already Connected to Database"]"#;
pub const DATABASE_CONFIG_ERROR: &str = r#"[0,"Database Config Error"]"#;
pub const DATABASE_CONNECTION_ERROR: &str = r#"[0,"Database Connection Error"]"#;
pub const CALL_NOT_FOUND: &str = r#"[0,"Error No Custom Call Not Found"]"#;
pub const INVALID_INPUT_FORMAT: &str = r#"[0,"Error Invalid Input Format"]"#;
pub const STRIP_CHAR_FOUND: &str = r#"[0,"Error Strip Char Found"]"#;
pub const SESSION_CONNECTION_ERROR: &str = r#"[0,"Error Database Connection Error"]"#;
pub const MAX_RETRIES: &str = r#"[0,"Error Max Retrys Reached"]"#;
pub const QUERY_ERROR: &str = r#"[0,"Error Query Error"]"#;
pub const INVALID_INPUT: &str = r#"[0,"Error Invalid Input"]"#;
pub const UNSUPPORTED_FIELD_TYPE: &str = r#"[0,"Error Unsupported Field Type"]"#;
pub const TIME_ERROR: &str = r#"[0,"ERROR"]"#;

/// `[2,"<handle>"]`
#[must_use]
pub fn stored(handle: u64) -> String {
    format!("[2,\"{handle}\"]")
}

/// `[1,<payload>]`
#[must_use]
pub fn success(payload: &str) -> String {
    format!("[1,{payload}]")
}

/// Whether `message` is a `[0...]` failure reply.
#[must_use]
pub fn is_failure(message: &str) -> bool {
    message.starts_with("[0")
}

#[must_use]
pub fn arity_mismatch(got: usize, expected: usize) -> String {
    format!("[0,\"Error Invalid Number of Inputs Got {got} Expected {expected}\"]")
}

/// The fixed reply for an error that ended a call.
#[must_use]
pub fn for_error(err: &ExtDbError) -> &'static str {
    match err {
        ExtDbError::StripCharacters(_) => STRIP_CHAR_FOUND,
        ExtDbError::ConnectionError(_) => SESSION_CONNECTION_ERROR,
        ExtDbError::InputError(_) | ExtDbError::ParameterError(_) => INVALID_INPUT,
        ExtDbError::Unsupported(_) => UNSUPPORTED_FIELD_TYPE,
        _ => QUERY_ERROR,
    }
}

/// Render rows as `[[a,b],[c,d]]`. Empty fields render as `""`.
#[must_use]
pub fn rows_literal(rows: &[Vec<String>]) -> String {
    let mut out = String::from("[");
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('[');
        for (j, field) in row.iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            if field.is_empty() {
                out.push_str("\"\"");
            } else {
                out.push_str(field);
            }
        }
        out.push(']');
    }
    out.push(']');
    out
}
