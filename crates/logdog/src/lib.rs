//! Chronological merging of growing log files.
//!
//! # Architecture
//!
//! - `field.rs`: value codecs (identity, strftime timestamps with year inference)
//! - `record.rs`: one decoded line, verbatim text plus named values
//! - `source.rs`: line stream + pattern + codecs, one record of lookahead
//! - `merge.rs`: k-way merge and the live-boundary wrapper
//! - `output.rs`: verbatim or templated rendering
//! - `checklog.rs`: watermark-based incremental pass
//!
//! Everything here runs on the caller's thread. Blocking happens only in
//! stream reads and in the one-second live-boundary wait.

pub mod checklog;
pub mod error;
pub mod field;
pub mod merge;
pub mod output;
pub mod record;
pub mod source;

pub use checklog::Checklog;
pub use error::{LogdogError, Result};
pub use field::{Field, FieldMap, StringField, TimestampField, Value};
pub use merge::{Clock, Merger, SystemClock, TimeSafeMerger, DEFAULT_KEY, LIVE_BOUNDARY};
pub use output::{OutputFormat, TemplateFormat};
pub use record::Record;
pub use source::{Advance, LinePattern, Source};
