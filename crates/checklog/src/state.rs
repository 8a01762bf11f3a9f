//! Persisted cursor between checklog runs.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conf::load::home_file;

pub const STATE_FILE_ENV: &str = "LOGDOG_STATE_FILE";
const DEFAULT_STATE_NAME: &str = ".logdog.state";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckState {
    /// Timestamp of the last record reported by the previous run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checklog: Option<NaiveDateTime>,

    /// Keys written by other tools are carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$LOGDOG_STATE_FILE`, falling back to `~/.logdog.state`.
    pub fn from_env() -> Self {
        let path = std::env::var_os(STATE_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| home_file(DEFAULT_STATE_NAME));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing state file is a first run, not an error.
    pub fn load(&self) -> io::Result<CheckState> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file, starting fresh");
                return Ok(CheckState::default());
            }
            Err(e) => return Err(e),
        };
        serde_json::from_reader(BufReader::new(file)).map_err(io::Error::from)
    }

    /// Write to a sibling temp file and rename over the old state, so a crash
    /// mid-write leaves the previous watermark intact.
    pub fn save(&self, state: &CheckState) -> io::Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, state).map_err(io::Error::from)?;
        writer.write_all(b"\n")?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), watermark = ?state.last_checklog, "state saved");
        Ok(())
    }
}
