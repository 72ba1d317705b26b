use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::pool::ConnectionPool;
use crate::reply;
use crate::results::ResultSet;
use crate::template::temporal_literal;
use crate::types::{ColumnKind, RowValues};

/// How text columns are quoted in pass-through replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextQuoting {
    #[default]
    Bare,
    /// `TEXT`: wrap in `"`.
    Double,
    /// `TEXT2`: wrap in `'`.
    Single,
}

/// Init flags of the pass-through protocol, `-`-separated and case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SqlOptions {
    pub quoting: TextQuoting,
    /// `NULL`: render NULL as `objNull` instead of `""`.
    pub null_as_obj_null: bool,
}

impl SqlOptions {
    /// Parse init text such as `TEXT2-NULL`. Unknown flags are ignored.
    #[must_use]
    pub fn parse(init: &str) -> Self {
        let mut options = Self::default();
        for token in init.split('-').map(str::trim).filter(|t| !t.is_empty()) {
            match token.to_ascii_uppercase().as_str() {
                "TEXT" => options.quoting = TextQuoting::Double,
                "TEXT2" => options.quoting = TextQuoting::Single,
                "NULL" => options.null_as_obj_null = true,
                _ => debug!(flag = token, "ignoring unknown SQL protocol flag"),
            }
        }
        options
    }
}

/// Runs caller-supplied SQL verbatim against one database.
#[derive(Debug)]
pub struct SqlPassThrough {
    pool: Arc<ConnectionPool>,
    options: SqlOptions,
}

impl SqlPassThrough {
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>, options: SqlOptions) -> Self {
        info!(
            db_id = pool.db_id(),
            quoting = ?options.quoting,
            null_as_obj_null = options.null_as_obj_null,
            "SQL protocol initialized"
        );
        Self { pool, options }
    }

    #[must_use]
    pub fn execute(&self, input: &str) -> String {
        let mut session = match self.pool.acquire() {
            Ok(session) => session,
            Err(err) => {
                error!(db_id = self.pool.db_id(), error = %err, "no session available");
                return reply::SESSION_CONNECTION_ERROR.to_string();
            }
        };
        match session.query(input) {
            Ok(result) => reply::success(&self.render(&result)),
            Err(err) => {
                warn!(db_id = self.pool.db_id(), input, error = %err, "pass-through query failed");
                if let Err(reset_err) = session.reset() {
                    warn!(error = %reset_err, "session reset failed");
                }
                reply::QUERY_ERROR.to_string()
            }
        }
    }

    fn render(&self, result: &ResultSet) -> String {
        let rows: Vec<Vec<String>> = result
            .results
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(idx, value)| {
                        let kind = result
                            .columns()
                            .get(idx)
                            .map(|c| c.kind)
                            .unwrap_or_default();
                        self.render_field(kind, value)
                    })
                    .collect()
            })
            .collect();
        reply::rows_literal(&rows)
    }

    fn render_field(&self, kind: ColumnKind, value: &RowValues) -> String {
        let Some(text) = value.to_field_text() else {
            return if self.options.null_as_obj_null {
                "objNull".to_string()
            } else {
                String::new()
            };
        };
        if let Some(literal) = temporal_literal(kind, &text) {
            return literal;
        }
        match (value.as_text(), self.options.quoting) {
            (Some(_), TextQuoting::Double) => quote(&text, '"'),
            (Some(_), TextQuoting::Single) => quote(&text, '\''),
            _ => text,
        }
    }
}

fn quote(text: &str, mark: char) -> String {
    let doubled: String = [mark, mark].iter().collect();
    format!("{mark}{}{mark}", text.replace(mark, &doubled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_flags_are_dash_separated() {
        let options = SqlOptions::parse("text2-null");
        assert_eq!(options.quoting, TextQuoting::Single);
        assert!(options.null_as_obj_null);
        assert_eq!(SqlOptions::parse(""), SqlOptions::default());
        assert_eq!(SqlOptions::parse("TEXT-bogus").quoting, TextQuoting::Double);
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote(r#"say "hi""#, '"'), r#""say ""hi""""#);
        assert_eq!(quote("it's", '\''), "'it''s'");
    }
}
