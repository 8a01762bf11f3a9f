//! Field codecs: turn captured substrings into typed values and back.
//!
//! A [`Source`](crate::source::Source) runs every captured group that has a
//! registered codec through [`Field::parse`]; an
//! [`OutputFormat`](crate::output::OutputFormat) runs values back through
//! [`Field::format`]. Names without a codec pass through unchanged.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::sync::Arc;

use chrono::format::{self, Item, Parsed, StrftimeItems};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use crate::error::{LogdogError, Result};

/// Display format used when a timestamp is rendered without a codec.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A synthesized year-less timestamp may run this far ahead of the reference
/// instant before it is attributed to the previous year.
const YEAR_ROLLBACK_SLACK_SECS: i64 = 60;

/// Decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(DEFAULT_TIMESTAMP_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

/// Value codec for one named field.
///
/// Both methods default to identity, so a custom codec only overrides the
/// direction it cares about.
pub trait Field: Send + Sync {
    fn parse(&self, raw: &str) -> Result<Value> {
        Ok(Value::Text(raw.to_string()))
    }

    fn format(&self, value: &Value) -> Result<String> {
        Ok(value.to_string())
    }
}

/// Field name → codec.
pub type FieldMap = HashMap<String, Arc<dyn Field>>;

/// Identity codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringField;

impl Field for StringField {}

/// strftime-style timestamp codec with year inference for year-less formats
/// (syslog `%b %d %H:%M:%S` and friends).
#[derive(Debug, Clone)]
pub struct TimestampField {
    format: String,
    reference: NaiveDateTime,
}

impl TimestampField {
    /// Build a codec whose year inference is relative to the local wall clock
    /// at construction time.
    pub fn new(format: &str) -> Result<Self> {
        Self::with_reference(format, Local::now().naive_local())
    }

    pub fn with_reference(format: &str, reference: NaiveDateTime) -> Result<Self> {
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(LogdogError::InvalidStrftime(format.to_string()));
        }
        Ok(Self {
            format: format.to_string(),
            reference,
        })
    }

    fn invalid(&self, input: &str) -> LogdogError {
        LogdogError::InvalidFormat {
            format: self.format.clone(),
            input: input.to_string(),
        }
    }

    /// Place a year-less parse in the reference year, or the one before it
    /// when that would put the line in the future.
    ///
    /// A parsed weekday is not checked: it belongs to whichever year the
    /// line was written in, which is what is being guessed here.
    fn infer_year(&self, parsed: &Parsed) -> Option<NaiveDateTime> {
        let time = parsed.to_naive_time().ok()?.with_nanosecond(0)?;
        let year = self.reference.year();

        let ts = date_in_year(parsed, year)?.and_time(time);
        if ts - self.reference > TimeDelta::seconds(YEAR_ROLLBACK_SLACK_SECS) {
            Some(date_in_year(parsed, year - 1)?.and_time(time))
        } else {
            Some(ts)
        }
    }
}

impl Field for TimestampField {
    fn parse(&self, raw: &str) -> Result<Value> {
        let mut parsed = Parsed::new();
        format::parse(&mut parsed, raw, StrftimeItems::new(&self.format))
            .map_err(|_| self.invalid(raw))?;
        fill_strptime_defaults(&mut parsed).map_err(|_| self.invalid(raw))?;

        let ts = if has_year(&parsed) {
            parsed
                .to_naive_datetime_with_offset(0)
                .map_err(|_| self.invalid(raw))?
        } else {
            self.infer_year(&parsed).ok_or_else(|| self.invalid(raw))?
        };
        Ok(Value::Timestamp(ts))
    }

    fn format(&self, value: &Value) -> Result<String> {
        let ts = value
            .as_timestamp()
            .ok_or_else(|| self.invalid(&value.to_string()))?;

        // Specifiers like %z have nothing to render from a naive timestamp and
        // surface as fmt::Error here instead of a panic in to_string().
        let mut out = String::new();
        write!(out, "{}", ts.format(&self.format)).map_err(|_| self.invalid(&ts.to_string()))?;
        Ok(out)
    }
}

/// Calendar date of a year-less parse placed in `year`.
fn date_in_year(parsed: &Parsed, year: i32) -> Option<NaiveDate> {
    match (parsed.month(), parsed.day(), parsed.ordinal()) {
        (Some(month), Some(day), _) => NaiveDate::from_ymd_opt(year, month, day),
        (_, _, Some(ordinal)) => NaiveDate::from_yo_opt(year, ordinal),
        // week-based dates need the weekday to land on a day at all
        _ => {
            let mut parsed = parsed.clone();
            parsed.set_year(i64::from(year)).ok()?;
            parsed.to_naive_date().ok()
        }
    }
}

fn has_year(parsed: &Parsed) -> bool {
    parsed.year().is_some()
        || parsed.year_div_100().is_some()
        || parsed.year_mod_100().is_some()
        || parsed.isoyear().is_some()
        || parsed.isoyear_div_100().is_some()
        || parsed.isoyear_mod_100().is_some()
        || parsed.timestamp().is_some()
}

/// Fill in what strptime(3) would assume for components the format omits:
/// January 1st, midnight, and AM for a 12-hour clock without `%p`.
fn fill_strptime_defaults(parsed: &mut Parsed) -> format::ParseResult<()> {
    if parsed.timestamp().is_some() {
        return Ok(());
    }
    let week_based = parsed.isoweek().is_some()
        || parsed.week_from_mon().is_some()
        || parsed.week_from_sun().is_some();
    if parsed.ordinal().is_none() && !week_based {
        if parsed.month().is_none() {
            parsed.set_month(1)?;
        }
        if parsed.day().is_none() {
            parsed.set_day(1)?;
        }
    }
    match (parsed.hour_div_12(), parsed.hour_mod_12()) {
        (None, None) => parsed.set_hour(0)?,
        (None, Some(_)) => parsed.set_ampm(false)?,
        _ => {}
    }
    if parsed.minute().is_none() {
        parsed.set_minute(0)?;
    }
    Ok(())
}
