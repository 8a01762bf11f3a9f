//! Source — one line stream plus the rules that decode it.
//!
//! A [`Source`] reads its stream one line at a time and keeps exactly one
//! decoded [`Record`] of lookahead. The merger compares lookaheads across
//! sources and consumes the earliest.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, trace};

use crate::error::{LogdogError, Result};
use crate::field::{Field, FieldMap, Value};
use crate::record::{strip_terminator, Record};

/// Compiled line pattern. Named groups become record fields.
#[derive(Debug, Clone)]
pub struct LinePattern {
    regex: Regex,
}

impl LinePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| LogdogError::PatternSyntax {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Names of all named groups, in pattern order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.regex.capture_names().flatten()
    }

    /// Match `line` (terminator excluded) and decode its captures.
    pub fn decode(&self, line: String, fields: &FieldMap) -> Result<Record> {
        let text = strip_terminator(&line);
        let caps = self
            .regex
            .captures(text)
            .ok_or_else(|| LogdogError::InvalidPattern {
                pattern: self.as_str().to_string(),
                line: text.to_string(),
            })?;

        let mut values = Vec::new();
        for name in self.group_names() {
            let Some(m) = caps.name(name) else {
                continue;
            };
            let value = match fields.get(name) {
                Some(codec) => codec.parse(m.as_str())?,
                None => Value::Text(m.as_str().to_string()),
            };
            values.push((name.to_string(), value));
        }

        Ok(Record::new(line, values))
    }
}

/// Outcome of [`Source::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A new record sits in the lookahead slot.
    Record,
    /// The stream had nothing more to read.
    Exhausted,
}

pub struct Source {
    name: String,
    reader: Box<dyn BufRead + Send>,
    pattern: LinePattern,
    fields: FieldMap,
    record: Option<Record>,
    exhausted: bool,
    buf: Vec<u8>,
}

impl Source {
    pub fn new<R>(reader: R, pattern: &str) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        Ok(Self {
            name: "<stream>".to_string(),
            reader: Box::new(reader),
            pattern: LinePattern::new(pattern)?,
            fields: FieldMap::new(),
            record: None,
            exhausted: false,
            buf: Vec::new(),
        })
    }

    /// Open `path` for reading from its beginning.
    pub fn open(path: impl AsRef<Path>, pattern: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), pattern)?.with_name(path.display().to_string()))
    }

    /// Label used in diagnostics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, codec: impl Field + 'static) -> Self {
        self.insert_field(name, Arc::new(codec));
        self
    }

    pub fn insert_field(&mut self, name: impl Into<String>, codec: Arc<dyn Field>) {
        self.fields.insert(name.into(), codec);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Replace the line pattern. Syntax errors surface here; a pattern that
    /// compiles but does not fit the content only fails on `advance()`.
    pub fn set_pattern(&mut self, pattern: &str) -> Result<()> {
        self.pattern = LinePattern::new(pattern)?;
        Ok(())
    }

    /// Swap in a new stream (e.g. the same file reopened for another run).
    /// The lookahead is dropped; the new stream must keep timestamps ascending.
    pub fn set_reader<R>(&mut self, reader: R)
    where
        R: BufRead + Send + 'static,
    {
        self.reader = Box::new(reader);
        self.record = None;
        self.exhausted = false;
    }

    /// The lookahead record, if the last `advance()` produced one.
    pub fn current_record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    pub(crate) fn take_record(&mut self) -> Option<Record> {
        self.record.take()
    }

    /// Whether the last poll found the stream empty.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Read and decode the next line into the lookahead slot.
    ///
    /// Polling again after `Exhausted` reads whatever was appended to the
    /// stream since.
    pub fn advance(&mut self) -> Result<Advance> {
        self.record = None;
        self.buf.clear();

        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            if !self.exhausted {
                debug!(source = %self.name, "source exhausted");
            }
            self.exhausted = true;
            return Ok(Advance::Exhausted);
        }
        self.exhausted = false;

        let line = String::from_utf8(std::mem::take(&mut self.buf)).map_err(|_| LogdogError::NonUtf8)?;
        let record = self.pattern.decode(line, &self.fields)?;
        trace!(source = %self.name, fields = record.len(), "decoded line");

        self.record = Some(record);
        Ok(Advance::Record)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("record", &self.record)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
