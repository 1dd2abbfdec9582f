//! Logger options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::csv::DEFAULT_DELIMITER;
use crate::error::{LogError, LogResult};

/// Directory used when none is configured, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Options recognized by [`create_logger`](crate::create_logger).
///
/// Missing keys take their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerOptions {
    /// Where the daily files go; relative paths resolve against the
    /// working directory.
    pub log_dir: PathBuf,

    /// Append `" (file:line)"` of the call site to each message.
    pub caller_info: bool,

    /// Column separator for the log files.
    pub delimiter: char,

    /// Print each record to stdout as well.
    pub console: bool,

    /// Flush and close this logger's files on Ctrl-C.
    pub handle_interrupt: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            caller_info: true,
            delimiter: DEFAULT_DELIMITER,
            console: true,
            handle_interrupt: true,
        }
    }
}

impl LoggerOptions {
    /// Defaults overridden by `DAYLOG_DIR`, `DAYLOG_CALLER_INFO`,
    /// `DAYLOG_DELIMITER` and `DAYLOG_CONSOLE`.
    pub fn from_env() -> LogResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> LogResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DAYLOG_DIR").filter(|d| !d.is_empty()) {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("DAYLOG_CALLER_INFO") {
            self.caller_info = parse_bool("DAYLOG_CALLER_INFO", &value)?;
        }
        if let Some(value) = lookup("DAYLOG_DELIMITER") {
            self.delimiter = parse_delimiter(&value)?;
        }
        if let Some(value) = lookup("DAYLOG_CONSOLE") {
            self.console = parse_bool("DAYLOG_CONSOLE", &value)?;
        }
        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> LogResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(LogError::Config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}

fn parse_delimiter(value: &str) -> LogResult<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(LogError::Config(format!(
            "DAYLOG_DELIMITER: expected a single character, got {value:?}"
        ))),
    }
}
