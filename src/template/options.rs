use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::error::ExtDbError;
use crate::types::BoundParam;

/// What to do when a stripped field actually contained forbidden characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StripMode {
    /// Remove the characters silently.
    #[default]
    Ignore,
    /// Remove the characters and log a warning.
    Log,
    /// Fail the call.
    Reject,
}

impl StripMode {
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(StripMode::Ignore),
            1 => Some(StripMode::Log),
            2 => Some(StripMode::Reject),
            _ => None,
        }
    }
}

/// Forbidden characters and the policy applied to fields flagged `strip`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripPolicy {
    pub chars: String,
    pub mode: StripMode,
}

impl StripPolicy {
    /// Remove forbidden characters from `value`.
    ///
    /// # Errors
    /// Returns `ExtDbError::StripCharacters` in reject mode when anything was removed.
    pub fn apply<'a>(&self, value: &'a str) -> Result<Cow<'a, str>, ExtDbError> {
        if self.chars.is_empty() || !value.chars().any(|c| self.chars.contains(c)) {
            return Ok(Cow::Borrowed(value));
        }
        match self.mode {
            StripMode::Reject => {
                warn!(token = value, "forbidden characters found, rejecting call");
                return Err(ExtDbError::StripCharacters(value.to_string()));
            }
            StripMode::Log => warn!(token = value, "forbidden characters stripped"),
            StripMode::Ignore => {}
        }
        Ok(Cow::Owned(
            value.chars().filter(|c| !self.chars.contains(*c)).collect(),
        ))
    }
}

/// Which side of a call an option list describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Transform flags for one input slot or output column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOption {
    /// Token index the input reads from (0 is the call name). Informational for outputs.
    pub value_number: usize,
    pub beguid: bool,
    pub bool_convert: bool,
    pub null_convert: bool,
    pub time_convert: bool,
    pub stringify: bool,
    pub stringify2: bool,
    pub add_escape_quotes: bool,
    pub remove_escape_quotes: bool,
    pub remove_quotes: bool,
    pub strip: bool,
    pub sql_escape: bool,
}

/// Parse a comma-separated option list such as `1-string,2-beguid,3`.
///
/// Every option is a `-`-joined set of case-insensitive flags plus an optional slot number.
/// Input options without a slot number are dropped. Unknown flags are collected in
/// the returned diagnostics and otherwise ignored.
#[must_use]
pub fn parse_field_options(flags: &str, direction: Direction) -> (Vec<FieldOption>, Vec<String>) {
    let mut options = Vec::new();
    let mut diagnostics = Vec::new();
    for token in flags.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let mut option = FieldOption::default();
        for flag in token.split('-') {
            let flag = flag.trim();
            match flag.to_ascii_lowercase().as_str() {
                "beguid" => option.beguid = true,
                "bool" => option.bool_convert = true,
                "null" => option.null_convert = true,
                "string" => option.stringify = true,
                "string2" => option.stringify2 = true,
                "add_escape_quotes" => option.add_escape_quotes = true,
                "remove_escape_quotes" => option.remove_escape_quotes = true,
                "remove_quotes" => option.remove_quotes = true,
                "strip" => option.strip = true,
                "time" if direction == Direction::Input => option.time_convert = true,
                "mysql_escape" if direction == Direction::Input => option.sql_escape = true,
                other => match other.parse::<usize>() {
                    Ok(number) => option.value_number = number,
                    Err(_) => diagnostics.push(format!("unknown {direction:?} option flag: {flag}")),
                },
            }
        }
        match direction {
            Direction::Input if option.value_number == 0 => {
                diagnostics.push(format!("input option without a value number: {token}"));
            }
            _ => options.push(option),
        }
    }
    (options, diagnostics)
}

/// `BE` + the identifier's little-endian bytes, md5 hashed and hex encoded.
///
/// # Errors
/// Returns `ExtDbError::InputError` when `value` is not a 64-bit integer.
pub fn beguid(value: &str) -> Result<String, ExtDbError> {
    let id: i64 = value
        .trim()
        .parse()
        .map_err(|_| ExtDbError::InputError(format!("beguid expects an integer id, got {value}")))?;
    let mut bytes = Vec::with_capacity(10);
    bytes.extend_from_slice(b"BE");
    bytes.extend_from_slice(&id.to_le_bytes());
    Ok(format!("{:x}", md5::compute(bytes)))
}

/// Parse a `[Y,M,D,h,m,s]` literal; missing trailing parts are zero.
///
/// # Errors
/// Returns `ExtDbError::InputError` for anything that is not a valid date array.
pub fn parse_time_literal(value: &str) -> Result<NaiveDateTime, ExtDbError> {
    let invalid = || ExtDbError::InputError(format!("invalid time literal: {value}"));
    let inner = value
        .trim()
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(invalid)?;
    let parts: Vec<u32> = inner
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;
    if parts.len() < 3 || parts.len() > 6 {
        return Err(invalid());
    }
    let part = |i: usize| parts.get(i).copied().unwrap_or(0);
    let year = i32::try_from(parts[0]).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, parts[1], parts[2])
        .and_then(|d| d.and_hms_opt(part(3), part(4), part(5)))
        .ok_or_else(invalid)
}

impl FieldOption {
    /// Shared pipeline: strip, beguid, bool, null, escape quotes, quote removal, wrapping, then
    /// SQL escaping. Returns `None` when the `null` flag meets an empty value.
    fn text_pipeline(
        &self,
        value: &str,
        strip: &StripPolicy,
        bool_map: impl Fn(&str) -> &'static str,
        escaper: Option<&dyn Fn(&str) -> String>,
    ) -> Result<Option<String>, ExtDbError> {
        let mut text: String = if self.strip {
            strip.apply(value)?.into_owned()
        } else {
            value.to_string()
        };
        if self.beguid {
            text = beguid(&text)?;
        }
        if self.bool_convert {
            text = bool_map(&text).to_string();
        }
        if self.null_convert && text.is_empty() {
            return Ok(None);
        }
        if self.remove_escape_quotes {
            text = text.replace("\"\"", "\"");
        }
        if self.add_escape_quotes {
            text = text.replace('"', "\"\"");
        }
        if self.remove_quotes {
            text = text.replace(['"', '\''], "");
        }
        if self.stringify {
            text = format!("\"{text}\"");
        }
        if self.stringify2 {
            text = format!("'{text}'");
        }
        if self.sql_escape
            && let Some(escape) = escaper
        {
            text = escape(&text);
        }
        Ok(Some(text))
    }

    /// Transform an input token for splicing into literal SQL.
    ///
    /// An empty `null` field becomes the SQL keyword `NULL`.
    ///
    /// # Errors
    /// Propagates strip rejections and beguid conversion failures.
    pub fn transform_literal_input(
        &self,
        value: &str,
        strip: &StripPolicy,
        escaper: &dyn Fn(&str) -> String,
    ) -> Result<String, ExtDbError> {
        Ok(self
            .text_pipeline(value, strip, input_bool, Some(escaper))?
            .unwrap_or_else(|| "NULL".to_string()))
    }

    /// Transform an input token into a prepared statement parameter.
    ///
    /// # Errors
    /// Propagates strip rejections, beguid failures and invalid time literals.
    pub fn transform_bound_input(
        &self,
        value: &str,
        strip: &StripPolicy,
    ) -> Result<BoundParam, ExtDbError> {
        match self.text_pipeline(value, strip, input_bool, None)? {
            None => Ok(BoundParam::Null),
            Some(text) if self.time_convert => Ok(BoundParam::DateTime(parse_time_literal(&text)?)),
            Some(text) => Ok(BoundParam::Text(text)),
        }
    }

    /// Transform an output field. NULL renders as `objNull` with the `null` flag, or as an
    /// empty field otherwise.
    ///
    /// # Errors
    /// Propagates strip rejections and beguid conversion failures.
    pub fn transform_output(
        &self,
        value: Option<&str>,
        strip: &StripPolicy,
    ) -> Result<String, ExtDbError> {
        let Some(value) = value else {
            return Ok(if self.null_convert {
                "objNull".to_string()
            } else {
                String::new()
            });
        };
        let output = FieldOption {
            null_convert: false,
            ..self.clone()
        };
        Ok(output
            .text_pipeline(value, strip, output_bool, None)?
            .unwrap_or_default())
    }
}

fn input_bool(value: &str) -> &'static str {
    if value.eq_ignore_ascii_case("true") || value == "1" {
        "1"
    } else {
        "0"
    }
}

fn output_bool(value: &str) -> &'static str {
    if value.eq_ignore_ascii_case("true") || value == "1" {
        "true"
    } else {
        "false"
    }
}
