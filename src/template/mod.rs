//! Configuration-driven query templates.
//!
//! A call input such as `getUser:42` names a [`CallDefinition`]; its tokens are validated
//! against the call's arity, transformed per input [`FieldOption`], and run against one pooled
//! session with bounded retry. Every outcome, including failures, is a reply string.

mod definition;
mod options;
mod output;

pub(crate) use output::temporal_literal;

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::ExtDbError;
use crate::literal;
use crate::pool::{ConnectionPool, Session};
use crate::reply;
use crate::results::ResultSet;

pub use definition::{
    CallDefinition, CallDefinitions, CallSettings, LoadReport, StatementTemplate, load_definitions,
};
pub use options::{
    Direction, FieldOption, StripMode, StripPolicy, beguid, parse_field_options,
    parse_time_literal,
};

/// Runs named calls from a loaded definition set against one database pool.
#[derive(Debug)]
pub struct QueryTemplateEngine {
    pool: Arc<ConnectionPool>,
    calls: CallDefinitions,
}

impl QueryTemplateEngine {
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>, calls: CallDefinitions) -> Self {
        Self { pool, calls }
    }

    /// Load a definition document for `pool`. The report says whether it loaded cleanly.
    #[must_use]
    pub fn from_source(pool: Arc<ConnectionPool>, source: &str) -> (Self, LoadReport) {
        let (calls, report) = load_definitions(source);
        (Self::new(pool, calls), report)
    }

    #[must_use]
    pub fn calls(&self) -> &CallDefinitions {
        &self.calls
    }

    /// Execute `input` (`<call>[:<args>]`) and return its reply.
    #[must_use]
    pub fn execute(&self, input: &str) -> String {
        let (name, args) = match input.split_once(':') {
            Some((name, args)) => (name, Some(args)),
            None => (input, None),
        };
        let Some(call) = self.calls.get(name) else {
            warn!(call = name, input, "call not found");
            return reply::CALL_NOT_FOUND.to_string();
        };

        let Some(tokens) = tokenize_input(call, input, name, args) else {
            warn!(call = name, input, "malformed call input");
            return reply::INVALID_INPUT_FORMAT.to_string();
        };
        let supplied = tokens.len() - 1;
        if supplied != call.arity {
            warn!(call = name, supplied, expected = call.arity, "wrong number of inputs");
            return reply::arity_mismatch(supplied, call.arity);
        }

        let mut session = match self.pool.acquire() {
            Ok(session) => session,
            Err(err) => {
                error!(call = name, db_id = self.pool.db_id(), error = %err, "no session available");
                return reply::SESSION_CONNECTION_ERROR.to_string();
            }
        };

        let result = match run_with_retry(call, &tokens, &mut session) {
            Ok(result) => result,
            Err(failure) => return failure.to_string(),
        };
        drop(session);

        match output::format_result(call, &result) {
            Ok(formatted) => formatted,
            Err(err) => {
                warn!(call = name, error = %err, "output transform failed");
                reply::for_error(&err).to_string()
            }
        }
    }
}

/// Token 0 is always the call name.
fn tokenize_input(
    call: &CallDefinition,
    input: &str,
    name: &str,
    args: Option<&str>,
) -> Option<Vec<String>> {
    if !call.settings.literal_parser {
        return Some(input.split(':').map(str::to_string).collect());
    }
    let mut tokens = vec![name.to_string()];
    if let Some(args) = args {
        tokens.extend(literal::tokenize(args)?);
    }
    Some(tokens)
}

fn run_with_retry(
    call: &CallDefinition,
    tokens: &[String],
    session: &mut Session,
) -> Result<ResultSet, &'static str> {
    let attempts = call.settings.retries.saturating_add(1);
    for attempt in 1..=attempts {
        let err = match run_statements(call, tokens, session) {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };
        if let Err(reset_err) = session.reset() {
            warn!(call = %call.name, error = %reset_err, "session reset failed");
        }
        if !err.is_retryable() {
            warn!(call = %call.name, attempt, error = %err, "call failed");
            return Err(reply::for_error(&err));
        }
        warn!(call = %call.name, attempt, attempts, error = %err, "attempt failed");
    }
    error!(call = %call.name, attempts, "retries exhausted");
    Err(reply::MAX_RETRIES)
}

/// Run every statement of `call`; the last statement's rows are the call's result.
fn run_statements(
    call: &CallDefinition,
    tokens: &[String],
    session: &mut Session,
) -> Result<ResultSet, ExtDbError> {
    let strip = &call.settings.strip;
    let mut last = None;
    for (index, statement) in call.statements.iter().enumerate() {
        let result = if call.settings.prepared {
            let params = statement
                .inputs
                .iter()
                .map(|option| option.transform_bound_input(&tokens[option.value_number], strip))
                .collect::<Result<Vec<_>, _>>()?;
            session.execute_prepared(&call.name, index, &statement.sql, &params)?
        } else {
            let mut sql = statement.sql.clone();
            for (position, option) in statement.inputs.iter().enumerate() {
                let value = option.transform_literal_input(
                    &tokens[option.value_number],
                    strip,
                    &|s: &str| session.escape_string(s),
                )?;
                sql = sql.replace(&format!("$CUSTOM_{}$", position + 1), &value);
            }
            debug!(call = %call.name, index, sql = %sql, "running literal statement");
            session.query(&sql)?
        };
        last = Some(result);
    }
    Ok(last.unwrap_or_default())
}
