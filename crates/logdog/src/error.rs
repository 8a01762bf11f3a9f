use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogdogError {
    /// A line did not match its source pattern. Fatal for the run.
    #[error("pattern /{pattern}/ does not match line \"{line}\"")]
    InvalidPattern { pattern: String, line: String },

    /// A captured value could not be decoded (or rendered) by its field codec.
    #[error("invalid timestamp format \"{format}\" for string \"{input}\"")]
    InvalidFormat { format: String, input: String },

    #[error("invalid line pattern /{pattern}/: {reason}")]
    PatternSyntax { pattern: String, reason: String },

    #[error("invalid strftime format \"{0}\"")]
    InvalidStrftime(String),

    #[error("record has no `{field}` field: \"{line}\"")]
    MissingTimestamp { field: String, line: String },

    #[error("field `{field}` is not a timestamp (no timestamp codec registered?): \"{line}\"")]
    NotATimestamp { field: String, line: String },

    #[error("template placeholder `{0}` has no matching field")]
    MissingPlaceholder(String),

    #[error("malformed output template: {0:?}")]
    MalformedTemplate(String),

    #[error("Non-UTF8 content")]
    NonUtf8,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LogdogError>;
