//! Output rendering for merged records.
//!
//! Templates use printf-style named placeholders: `%(name)s`, with `%%` for a
//! literal percent sign. They are parsed once, up front.

use std::sync::Arc;

use crate::error::{LogdogError, Result};
use crate::field::{Field, FieldMap};
use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Template renderer with optional per-field codecs.
#[derive(Clone)]
pub struct TemplateFormat {
    template: String,
    segments: Vec<Segment>,
    fields: FieldMap,
}

impl TemplateFormat {
    pub fn new(template: &str) -> Result<Self> {
        Ok(Self {
            template: template.to_string(),
            segments: parse_template(template)?,
            fields: FieldMap::new(),
        })
    }

    pub fn with_field(mut self, name: impl Into<String>, codec: impl Field + 'static) -> Self {
        self.insert_field(name, Arc::new(codec));
        self
    }

    pub fn insert_field(&mut self, name: impl Into<String>, codec: Arc<dyn Field>) {
        self.fields.insert(name.into(), codec);
    }

    /// Field names referenced by the template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, record: &Record) -> Result<String> {
        let mut out = String::with_capacity(self.template.len() + record.raw_text.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = record
                        .get(name)
                        .ok_or_else(|| LogdogError::MissingPlaceholder(name.clone()))?;
                    match self.fields.get(name) {
                        Some(codec) => out.push_str(&codec.format(value)?),
                        None => out.push_str(&value.to_string()),
                    }
                }
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for TemplateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateFormat")
            .field("template", &self.template)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub enum OutputFormat {
    /// The source line exactly as read.
    #[default]
    Original,
    Template(TemplateFormat),
}

impl OutputFormat {
    pub fn render(&self, record: &Record) -> Result<String> {
        match self {
            OutputFormat::Original => Ok(record.raw_text.clone()),
            OutputFormat::Template(template) => template.render(record),
        }
    }

    /// Fail fast when a placeholder names a field the sources cannot produce.
    pub fn check_fields<'n, I>(&self, available: I) -> Result<()>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let OutputFormat::Template(template) = self else {
            return Ok(());
        };
        let available: Vec<&str> = available.into_iter().collect();
        match template.placeholders().find(|name| !available.contains(name)) {
            Some(missing) => Err(LogdogError::MissingPlaceholder(missing.to_string())),
            None => Ok(()),
        }
    }
}

fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let malformed = || LogdogError::MalformedTemplate(template.to_string());
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => literal.push('%'),
            Some('(') => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(malformed()),
                    }
                }
                if name.is_empty() || chars.next() != Some('s') {
                    return Err(malformed());
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            }
            _ => return Err(malformed()),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{TimestampField, Value};
    use chrono::NaiveDate;

    fn record(raw: &str, fields: &[(&str, &str)]) -> Record {
        Record::new(
            raw,
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect(),
        )
    }

    #[test]
    fn test_original_renders_raw_text() {
        let r = record("hello world\n", &[("a1", "hello"), ("a2", "world")]);
        assert_eq!(OutputFormat::Original.render(&r).unwrap(), "hello world\n");
    }

    #[test]
    fn test_template_substitutes_fields() {
        let r = record("\n", &[("a1", "hello"), ("a2", "world")]);
        let out = OutputFormat::Template(TemplateFormat::new("%(a1)s %(a2)s\n").unwrap());
        assert_eq!(out.render(&r).unwrap(), "hello world\n");
    }

    #[test]
    fn test_template_custom_field_format() {
        struct World;
        impl Field for World {
            fn format(&self, _value: &Value) -> Result<String> {
                Ok("world".to_string())
            }
        }

        let r = record("\n", &[("a1", "hello"), ("a2", "")]);
        let template = TemplateFormat::new("%(a1)s %(a2)s\n").unwrap().with_field("a2", World);
        assert_eq!(template.render(&r).unwrap(), "hello world\n");
    }

    #[test]
    fn test_template_timestamp_field() {
        let when = NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let r = Record::new("ignored\n", vec![("ts".to_string(), Value::Timestamp(when))]);

        let template = TemplateFormat::new("%(ts)s test\n")
            .unwrap()
            .with_field("ts", TimestampField::new("%b %d %H:%M:%S").unwrap());
        assert_eq!(template.render(&r).unwrap(), "Oct 17 12:30:00 test\n");

        let plain = TemplateFormat::new("[%(ts)s]").unwrap();
        assert_eq!(plain.render(&r).unwrap(), "[2026-10-17 12:30:00]");
    }

    #[test]
    fn test_template_percent_escape() {
        let r = record("\n", &[("pct", "42")]);
        let template = TemplateFormat::new("%(pct)s%% done").unwrap();
        assert_eq!(template.render(&r).unwrap(), "42% done");
    }

    #[test]
    fn test_template_missing_field_at_render() {
        let r = record("\n", &[("a1", "hello")]);
        let template = TemplateFormat::new("%(a1)s %(nope)s").unwrap();
        let err = template.render(&r).unwrap_err();
        assert!(matches!(err, LogdogError::MissingPlaceholder(name) if name == "nope"));
    }

    #[test]
    fn test_malformed_templates_rejected_up_front() {
        for bad in ["%d", "%(open", "%(name)d", "trailing %", "%()s"] {
            let result = TemplateFormat::new(bad);
            assert!(
                matches!(result, Err(LogdogError::MalformedTemplate(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_placeholders_in_order() {
        let template = TemplateFormat::new("%(b)s-%(a)s-%(b)s").unwrap();
        assert_eq!(template.placeholders().collect::<Vec<_>>(), ["b", "a", "b"]);
    }

    #[test]
    fn test_check_fields() {
        let out = OutputFormat::Template(TemplateFormat::new("%(ts)s %(msg)s\n").unwrap());
        assert!(out.check_fields(["ts", "host", "msg"]).is_ok());
        assert!(matches!(
            out.check_fields(["ts", "host"]),
            Err(LogdogError::MissingPlaceholder(name)) if name == "msg"
        ));
        assert!(OutputFormat::Original.check_fields(std::iter::empty::<&str>()).is_ok());
    }
}
