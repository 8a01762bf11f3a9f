//! Run — one checklog pass from configured sources to a writer.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use logdog::{Checklog, Clock, Merger, Source, SystemClock, TimeSafeMerger};
use tracing::{debug, info};

use crate::conf::CheckConfig;
use crate::state::CheckState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub skipped: u64,
    pub emitted: u64,
    pub watermark: Option<NaiveDateTime>,
}

/// Open every configured source from the start of its file.
pub fn open_sources(config: &CheckConfig) -> Result<Vec<Source>> {
    config
        .sources
        .iter()
        .map(|source| {
            source
                .open()
                .with_context(|| format!("Failed to open source {}", source.path))
                .inspect(|opened| debug!(source = opened.name(), pattern = opened.pattern(), "opened source"))
        })
        .collect()
}

pub fn run<W: Write>(config: &CheckConfig, state: &mut CheckState, out: &mut W) -> Result<RunSummary> {
    run_with_clock(config, state, out, SystemClock)
}

/// Merge all sources, write every line past the watermark to `out`, and move
/// the watermark in `state` forward.
///
/// On failure whatever was already written is flushed and `state` is left
/// as it was, so the next run starts over from the old watermark.
pub fn run_with_clock<W, C>(
    config: &CheckConfig,
    state: &mut CheckState,
    out: &mut W,
    clock: C,
) -> Result<RunSummary>
where
    W: Write,
    C: Clock,
{
    let output = config.output.build().context("Failed to build output format")?;
    let mut sources = open_sources(config)?;

    let merged = TimeSafeMerger::with_clock(Merger::new(&mut sources), clock);
    let mut pass = Checklog::new(merged, &output, state.last_checklog);

    for line in pass.by_ref() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                out.flush().context("Failed to flush output")?;
                return Err(e).context("checklog pass aborted, state not updated");
            }
        };
        out.write_all(line.as_bytes()).context("Failed to write output")?;
    }
    out.flush().context("Failed to flush output")?;

    let (skipped, emitted) = pass.stats();
    let watermark = pass.watermark();
    state.last_checklog = watermark;
    info!(skipped, emitted, watermark = ?watermark, "checklog pass complete");

    Ok(RunSummary {
        skipped,
        emitted,
        watermark,
    })
}
