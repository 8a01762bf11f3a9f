//! Chronological k-way merge across sources.
//!
//! - [`Merger`]: repeatedly yields the earliest lookahead among all sources.
//! - [`TimeSafeMerger`]: drains a [`Merger`], then guards the live boundary
//!   when the output has caught up with the wall clock.
//!
//! Both are single-pass iterators of `Result<Record>`. An error is yielded once
//! and ends the iteration.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};
use tracing::debug;

use crate::error::Result;
use crate::record::Record;
use crate::source::{Advance, Source};

/// Field every source must decode to a timestamp.
pub const DEFAULT_KEY: &str = "ts";

/// Grace period granted to writers racing the tail of a live merge.
/// Matches one-second timestamp resolution.
pub const LIVE_BOUNDARY: Duration = Duration::from_secs(1);

pub struct Merger<'a> {
    sources: &'a mut [Source],
    key: String,
    /// Indices into `sources` that hold a lookahead, in configuration order.
    active: Vec<usize>,
    primed: bool,
    done: bool,
    yielded: u64,
}

impl<'a> Merger<'a> {
    pub fn new(sources: &'a mut [Source]) -> Self {
        Self::with_key(sources, DEFAULT_KEY)
    }

    pub fn with_key(sources: &'a mut [Source], key: &str) -> Self {
        Self {
            sources,
            key: key.to_string(),
            active: Vec::new(),
            primed: false,
            done: false,
            yielded: 0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Records yielded so far.
    pub fn stats(&self) -> u64 {
        self.yielded
    }

    /// Poll every source without a lookahead again and re-admit those that
    /// produced a record. A fused merger stays fused.
    pub fn resume(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        self.admit()
    }

    /// Rebuild the active set: sources already holding a lookahead keep it,
    /// the rest are advanced once.
    fn admit(&mut self) -> Result<()> {
        self.primed = true;
        self.active.clear();
        for idx in 0..self.sources.len() {
            let source = &mut self.sources[idx];
            if source.current_record().is_some() || source.advance()? == Advance::Record {
                self.active.push(idx);
            }
        }
        debug!(sources = self.sources.len(), active = self.active.len(), "merge admitted sources");
        Ok(())
    }

    /// Position in `active` of the source with the earliest lookahead.
    /// Ties go to the source configured first.
    fn earliest(&self) -> Result<Option<usize>> {
        let mut best: Option<(usize, NaiveDateTime)> = None;
        for (pos, &idx) in self.active.iter().enumerate() {
            let Some(record) = self.sources[idx].current_record() else {
                continue;
            };
            let ts = record.timestamp(&self.key)?;
            match best {
                Some((_, best_ts)) if best_ts <= ts => {}
                _ => best = Some((pos, ts)),
            }
        }
        Ok(best.map(|(pos, _)| pos))
    }

    /// Timestamp of the record the next `next()` would yield, leaving it
    /// buffered in its source.
    pub fn peek_timestamp(&mut self) -> Result<Option<NaiveDateTime>> {
        if self.done {
            return Ok(None);
        }
        if !self.primed {
            self.admit()?;
        }
        let Some(pos) = self.earliest()? else {
            return Ok(None);
        };
        let idx = self.active[pos];
        self.sources[idx]
            .current_record()
            .map(|record| record.timestamp(&self.key))
            .transpose()
    }

    fn step(&mut self) -> Result<Option<Record>> {
        if !self.primed {
            self.admit()?;
        }

        let Some(pos) = self.earliest()? else {
            self.active.clear();
            return Ok(None);
        };
        let idx = self.active[pos];
        let source = &mut self.sources[idx];

        let record = source.take_record();
        if source.advance()? == Advance::Exhausted {
            self.active.remove(pos);
        }
        Ok(record)
    }
}

impl Iterator for Merger<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => {
                self.yielded += 1;
                Some(Ok(record))
            }
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Wall clock used by the live boundary check.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
    fn sleep(&self, duration: Duration);
}

/// Local wall clock, matching the naive local timestamps produced by
/// [`TimestampField`](crate::field::TimestampField).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Draining,
    /// Second pass after the live wait; stop at the first record at or past
    /// the boundary.
    Boundary(NaiveDateTime),
    Done,
}

pub struct TimeSafeMerger<'a, C: Clock = SystemClock> {
    merger: Merger<'a>,
    clock: C,
    phase: Phase,
    last: Option<NaiveDateTime>,
}

impl<'a> TimeSafeMerger<'a, SystemClock> {
    pub fn new(sources: &'a mut [Source]) -> Self {
        Self::with_clock(Merger::new(sources), SystemClock)
    }
}

impl<'a, C: Clock> TimeSafeMerger<'a, C> {
    pub fn with_clock(merger: Merger<'a>, clock: C) -> Self {
        Self {
            merger,
            clock,
            phase: Phase::Draining,
            last: None,
        }
    }

    /// Timestamp of the last record handed out.
    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.last
    }

    pub fn stats(&self) -> u64 {
        self.merger.stats()
    }

    /// Called once the first drain is complete. Decides whether the tail is
    /// live and, if so, waits and re-arms the merger for the boundary pass.
    fn after_drain(&mut self) -> Result<Phase> {
        let Some(last) = self.last else {
            return Ok(Phase::Done);
        };
        let live_window = TimeDelta::seconds(LIVE_BOUNDARY.as_secs() as i64);
        if self.clock.now() - last >= live_window {
            return Ok(Phase::Done);
        }

        debug!(last = %last, "merge reached the live boundary, waiting for late writes");
        self.clock.sleep(LIVE_BOUNDARY);
        let until = floor_to_second(last) + live_window;
        self.merger.resume()?;
        Ok(Phase::Boundary(until))
    }

    fn step(&mut self) -> Result<Option<Record>> {
        loop {
            match self.phase {
                Phase::Done => return Ok(None),
                Phase::Draining => match self.merger.next().transpose()? {
                    Some(record) => {
                        self.last = Some(record.timestamp(self.merger.key())?);
                        return Ok(Some(record));
                    }
                    None => self.phase = self.after_drain()?,
                },
                Phase::Boundary(until) => {
                    // The boundary record stays in its source's lookahead for
                    // whoever merges these sources next.
                    match self.merger.peek_timestamp()? {
                        Some(ts) if ts < until => {}
                        Some(_) => {
                            debug!(boundary = %until, "holding back record at the live boundary");
                            self.phase = Phase::Done;
                            return Ok(None);
                        }
                        None => {
                            self.phase = Phase::Done;
                            return Ok(None);
                        }
                    }
                    let Some(record) = self.merger.next().transpose()? else {
                        self.phase = Phase::Done;
                        return Ok(None);
                    };
                    self.last = Some(record.timestamp(self.merger.key())?);
                    return Ok(Some(record));
                }
            }
        }
    }
}

impl<C: Clock> Iterator for TimeSafeMerger<'_, C> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.phase = Phase::Done;
                Some(Err(e))
            }
        }
    }
}

fn floor_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}
