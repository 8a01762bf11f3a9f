//! Checklog — one incremental pass over merged records.
//!
//! Records at or before the persisted watermark were already reported by an
//! earlier run and are skipped; everything after it is rendered. Once the
//! pass is over, [`Checklog::watermark`] is what the caller persists.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::Result;
use crate::merge::DEFAULT_KEY;
use crate::output::OutputFormat;
use crate::record::Record;

pub struct Checklog<'o, I> {
    records: I,
    output: &'o OutputFormat,
    key: String,
    previous: Option<NaiveDateTime>,
    last: Option<NaiveDateTime>,
    skipping: bool,
    failed: bool,
    skipped: u64,
    emitted: u64,
}

impl<'o, I> Checklog<'o, I>
where
    I: Iterator<Item = Result<Record>>,
{
    pub fn new(records: I, output: &'o OutputFormat, watermark: Option<NaiveDateTime>) -> Self {
        Self {
            records,
            output,
            key: DEFAULT_KEY.to_string(),
            previous: watermark,
            last: None,
            skipping: watermark.is_some(),
            failed: false,
            skipped: 0,
            emitted: 0,
        }
    }

    /// Compare against `key` instead of [`DEFAULT_KEY`]; pairs with
    /// [`Merger::with_key`](crate::merge::Merger::with_key).
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    /// Watermark to persist after the pass: the latest timestamp consumed,
    /// never earlier than the one the pass started from.
    pub fn watermark(&self) -> Option<NaiveDateTime> {
        match (self.previous, self.last) {
            (Some(prev), Some(last)) => Some(prev.max(last)),
            (prev, last) => last.or(prev),
        }
    }

    /// Whether the pass stopped on an error. The watermark must not be
    /// persisted in that case.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// `(skipped, emitted)` record counts.
    pub fn stats(&self) -> (u64, u64) {
        (self.skipped, self.emitted)
    }

    fn step(&mut self) -> Result<Option<String>> {
        while let Some(record) = self.records.next().transpose()? {
            let ts = record.timestamp(&self.key)?;
            self.last = Some(ts);

            if self.skipping {
                if self.previous.is_some_and(|w| ts <= w) {
                    self.skipped += 1;
                    continue;
                }
                self.skipping = false;
                debug!(skipped = self.skipped, "caught up with the watermark");
            }

            let line = self.output.render(&record)?;
            self.emitted += 1;
            return Ok(Some(line));
        }
        Ok(None)
    }
}

impl<I> Iterator for Checklog<'_, I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(line) => line.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
