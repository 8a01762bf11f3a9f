use chrono::NaiveDateTime;

use crate::error::{LogdogError, Result};
use crate::field::Value;

/// One decoded log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Original line, terminator included. Always preserved.
    pub raw_text: String,

    /// Named captures in pattern order. Optional groups that did not take
    /// part in the match are absent.
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(raw_text: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            raw_text: raw_text.into(),
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Look up `name` as the record's sort key.
    pub fn timestamp(&self, name: &str) -> Result<NaiveDateTime> {
        match self.get(name) {
            Some(Value::Timestamp(ts)) => Ok(*ts),
            Some(Value::Text(_)) => Err(LogdogError::NotATimestamp {
                field: name.to_string(),
                line: self.line().to_string(),
            }),
            None => Err(LogdogError::MissingTimestamp {
                field: name.to_string(),
                line: self.line().to_string(),
            }),
        }
    }

    /// The original line without its terminator.
    pub fn line(&self) -> &str {
        strip_terminator(&self.raw_text)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Drop one trailing `\n` (and a `\r` right before it).
pub(crate) fn strip_terminator(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => line,
    }
}
