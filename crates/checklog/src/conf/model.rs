//! Model — CheckConfig and related structs.

use std::collections::HashMap;
use std::sync::Arc;

use logdog::{Field, OutputFormat, Source, StringField, TemplateFormat, TimestampField};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub logging: LoggingConfig,
    pub sources: Vec<SourceConfig>,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive. `RUST_LOG` takes precedence.
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: String,
    pub pattern: String,
    #[serde(default)]
    pub fields: HashMap<String, FieldConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldConfig {
    String,
    Timestamp { format: String },
}

/// Verbatim output unless a template is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub template: Option<String>,
    pub fields: HashMap<String, FieldConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl FieldConfig {
    pub fn build(&self) -> logdog::Result<Arc<dyn Field>> {
        Ok(match self {
            FieldConfig::String => Arc::new(StringField),
            FieldConfig::Timestamp { format } => Arc::new(TimestampField::new(format)?),
        })
    }
}

impl SourceConfig {
    /// Open the file from its beginning with the configured pattern and codecs.
    pub fn open(&self) -> logdog::Result<Source> {
        let mut source = Source::open(&self.path, &self.pattern)?;
        for (name, field) in &self.fields {
            source.insert_field(name.clone(), field.build()?);
        }
        Ok(source)
    }
}

impl OutputConfig {
    pub fn build(&self) -> logdog::Result<OutputFormat> {
        let Some(template) = &self.template else {
            return Ok(OutputFormat::Original);
        };
        let mut format = TemplateFormat::new(template)?;
        for (name, field) in &self.fields {
            format.insert_field(name.clone(), field.build()?);
        }
        Ok(OutputFormat::Template(format))
    }
}
