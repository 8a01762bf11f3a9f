//! Load — config loading from file and environment variables.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use logdog::{LinePattern, DEFAULT_KEY};

use super::model::{CheckConfig, FieldConfig};

pub const CONFIG_FILE_ENV: &str = "LOGDOG_CONFIG_FILE";
pub const LOG_LEVEL_ENV: &str = "LOGDOG_LOG_LEVEL";
const DEFAULT_CONFIG_NAME: &str = ".logdog.toml";

/// `$HOME/<name>`, or `<name>` in the working directory when HOME is unset.
pub(crate) fn home_file(name: &str) -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(name),
        None => PathBuf::from(name),
    }
}

impl CheckConfig {
    /// Load configuration from the config file, then apply environment
    /// overrides. Priority: Environment Variables > Config File > Defaults
    ///
    /// Unlike a daemon, checklog has nothing sensible to do without sources,
    /// so a missing config file is an error.
    pub fn load() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let config_path = std::env::var_os(CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| home_file(DEFAULT_CONFIG_NAME));

        let mut config = Self::from_file(&config_path)
            .map_err(|e| format!("{}: {}", config_path.display(), e))?;

        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.logging.level = level;
        }
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: CheckConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Check everything that can be checked before touching any log file:
    /// patterns compile and expose the merge key, the merge key is decoded as
    /// a timestamp, and every template placeholder exists in every source.
    pub fn validate(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err("at least one [[sources]] entry is required".to_string());
        }

        let output = self
            .output
            .build()
            .map_err(|e| format!("output: {}", e))?;

        for (i, source) in self.sources.iter().enumerate() {
            if source.path.is_empty() {
                return Err(format!("sources[{}].path must not be empty", i));
            }
            let pattern = LinePattern::new(&source.pattern)
                .map_err(|e| format!("sources[{}] ({}): {}", i, source.path, e))?;

            if !pattern.group_names().any(|name| name == DEFAULT_KEY) {
                return Err(format!(
                    "sources[{}] ({}): pattern has no `{}` group",
                    i, source.path, DEFAULT_KEY
                ));
            }
            match source.fields.get(DEFAULT_KEY) {
                Some(FieldConfig::Timestamp { .. }) => {}
                _ => {
                    return Err(format!(
                        "sources[{}] ({}): field `{}` needs type = \"timestamp\"",
                        i, source.path, DEFAULT_KEY
                    ))
                }
            }
            for (name, field) in &source.fields {
                field
                    .build()
                    .map_err(|e| format!("sources[{}].fields.{}: {}", i, name, e))?;
            }

            output
                .check_fields(pattern.group_names())
                .map_err(|e| format!("output vs sources[{}] ({}): {}", i, source.path, e))?;
        }
        Ok(())
    }
}
