//! Wall-clock helpers behind `LOCAL_TIME`, `UTC_TIME`, `DATEADD` and `UPTIME`.

use std::time::Duration;

use chrono::{Datelike, Local, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};

use crate::error::ExtDbError;

fn invalid(text: &str) -> ExtDbError {
    ExtDbError::InputError(format!("invalid time literal {text}"))
}

fn parse_int_list(text: &str) -> Result<Vec<i64>, ExtDbError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| invalid(text))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| part.trim().parse::<i64>().map_err(|_| invalid(text)))
        .collect()
}

#[must_use]
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

#[must_use]
pub fn now_utc() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// `[Y,M,D,h,m,s]`
#[must_use]
pub fn date_array(at: NaiveDateTime) -> String {
    format!(
        "[{},{},{},{},{},{}]",
        at.year(),
        at.month(),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

fn add_months(at: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        at.checked_add_months(magnitude)
    } else {
        at.checked_sub_months(magnitude)
    }
}

/// Shift `base` by an offset argument: a bare number of hours, or `[y,mo,d,h,mi,s]` where
/// each present position is applied in its own unit.
///
/// # Errors
/// Returns `ExtDbError::InputError` when the offset is malformed or leaves the calendar range.
pub fn apply_offset(base: NaiveDateTime, offset: &str) -> Result<NaiveDateTime, ExtDbError> {
    let offset = offset.trim();
    if offset.is_empty() {
        return Ok(base);
    }
    if !offset.starts_with('[') {
        let hours: i64 = offset.parse().map_err(|_| invalid(offset))?;
        let delta = TimeDelta::try_hours(hours).ok_or_else(|| invalid(offset))?;
        return base.checked_add_signed(delta).ok_or_else(|| invalid(offset));
    }
    let parts = parse_int_list(offset)?;
    if parts.len() > 6 {
        return Err(invalid(offset));
    }
    let mut at = base;
    for (position, value) in parts.into_iter().enumerate() {
        let shifted = match position {
            0 => value.checked_mul(12).and_then(|m| add_months(at, m)),
            1 => add_months(at, value),
            2 => TimeDelta::try_days(value).and_then(|d| at.checked_add_signed(d)),
            3 => TimeDelta::try_hours(value).and_then(|d| at.checked_add_signed(d)),
            4 => TimeDelta::try_minutes(value).and_then(|d| at.checked_add_signed(d)),
            _ => TimeDelta::try_seconds(value).and_then(|d| at.checked_add_signed(d)),
        };
        at = shifted.ok_or_else(|| invalid(offset))?;
    }
    Ok(at)
}

/// `DATEADD:[Y,M,D,h,m,s]:[d,h,m,s]`
///
/// # Errors
/// Returns `ExtDbError::InputError` unless the start is a valid six-part date-time and the
/// delta has exactly four parts.
pub fn date_add(start: &str, delta: &str) -> Result<NaiveDateTime, ExtDbError> {
    let parts = parse_int_list(start)?;
    let [year, month, day, hour, minute, second] = parts[..] else {
        return Err(invalid(start));
    };
    let field = |v: i64| u32::try_from(v).map_err(|_| invalid(start));
    let at = i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, field(month).ok()?, field(day).ok()?))
        .and_then(|d| d.and_hms_opt(field(hour).ok()?, field(minute).ok()?, field(second).ok()?))
        .ok_or_else(|| invalid(start))?;

    let delta_parts = parse_int_list(delta)?;
    let [days, hours, minutes, seconds] = delta_parts[..] else {
        return Err(invalid(delta));
    };
    let total = days
        .checked_mul(86_400)
        .and_then(|s| s.checked_add(hours.checked_mul(3_600)?))
        .and_then(|s| s.checked_add(minutes.checked_mul(60)?))
        .and_then(|s| s.checked_add(seconds))
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| invalid(delta))?;
    at.checked_add_signed(total).ok_or_else(|| invalid(delta))
}

/// Elapsed time in `SECONDS`, `MINUTES` or `HOURS`; any other unit yields `None`.
#[must_use]
pub fn uptime_in(elapsed: Duration, unit: &str) -> Option<u64> {
    let seconds = elapsed.as_secs();
    match unit {
        "SECONDS" => Some(seconds),
        "MINUTES" => Some(seconds / 60),
        "HOURS" => Some(seconds / 3_600),
        _ => None,
    }
}
