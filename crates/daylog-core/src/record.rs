//! Log record types.
//!
//! A [`LogRecord`] is built once per logging call and dropped after it has
//! been rendered to the console and encoded for the log file.

use std::fmt;

use serde_json::Value;

use crate::caller::CallSite;
use crate::csv::RowEncoder;

/// Severity of a log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warn,
    Error,
    Debug,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Info, Level::Warn, Level::Error, Level::Debug];

    /// Tag written to the console and to the level column.
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARNING",
            Level::Error => "ERROR",
            Level::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// ISO 8601 timestamp (e.g., "2024-03-01T12:34:56.789Z")
    pub timestamp: String,

    pub level: Level,

    /// Message as passed by the caller
    pub message: String,

    /// Where the call came from, when attribution is enabled
    pub call_site: Option<CallSite>,

    /// Optional structured payload
    pub metadata: Option<Value>,
}

impl LogRecord {
    pub fn new(timestamp: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            level,
            message: message.into(),
            call_site: None,
            metadata: None,
        }
    }

    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The message with the call site folded in as a `" (file:line)"` suffix.
    pub fn message_text(&self) -> String {
        match &self.call_site {
            Some(site) => format!("{} ({})", self.message, site),
            None => self.message.clone(),
        }
    }

    /// Fields in column order: timestamp, level, message, metadata.
    ///
    /// The metadata column is always present; a missing payload becomes
    /// `null`, which encodes as an empty field.
    pub fn fields(&self) -> Vec<Value> {
        vec![
            Value::String(self.timestamp.clone()),
            Value::String(self.level.tag().to_string()),
            Value::String(self.message_text()),
            self.metadata.clone().unwrap_or(Value::Null),
        ]
    }

    /// Encode as one log file row.
    pub fn to_row(&self, encoder: &RowEncoder) -> String {
        encoder.encode(&self.fields())
    }

    /// Uncolored console line: `TAG, message[, {json}]`.
    pub fn console_line(&self) -> String {
        let mut line = format!("{}, {}", self.level.tag(), self.message_text());
        if let Some(metadata) = self.metadata.as_ref().filter(|m| !m.is_null()) {
            line.push_str(", ");
            line.push_str(&metadata.to_string());
        }
        line
    }
}
