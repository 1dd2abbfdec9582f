//! Delimited row encoding for log records.
//!
//! Rows are "CSV-like", not RFC 4180: a field that would be ambiguous is
//! wrapped in double quotes and any double quotes inside it are dropped.
//! The result is always one line per row when read back by a lenient
//! reader, at the cost of losing literal quote characters.

use serde_json::Value;

use crate::error::{LogError, LogResult};

/// Field separator used when none is configured.
pub const DEFAULT_DELIMITER: char = ';';

/// Encodes field lists into delimited rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowEncoder {
    delimiter: char,
}

impl RowEncoder {
    /// Create an encoder for `delimiter`.
    ///
    /// Quote and line-break characters are rejected since they are part of
    /// the quoting scheme itself.
    pub fn new(delimiter: char) -> LogResult<Self> {
        if matches!(delimiter, '"' | '\n' | '\r') {
            return Err(LogError::InvalidDelimiter(delimiter));
        }
        Ok(Self { delimiter })
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Render `fields` as one newline-terminated row.
    pub fn encode(&self, fields: &[Value]) -> String {
        let mut row = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                row.push(self.delimiter);
            }
            let text = stringify(field);
            if self.needs_quoting(&text) {
                row.push('"');
                row.extend(text.chars().filter(|&c| c != '"'));
                row.push('"');
            } else {
                row.push_str(&text);
            }
        }
        row.push('\n');
        row
    }

    fn needs_quoting(&self, text: &str) -> bool {
        // Commas are quoted even with another delimiter so rows stay readable
        // by comma-separated tooling.
        text.chars()
            .any(|c| c == self.delimiter || matches!(c, ',' | '"' | '\n' | '\r'))
    }
}

impl Default for RowEncoder {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

/// Encode `fields` with `delimiter`.
///
/// Invalid delimiters fall back to [`DEFAULT_DELIMITER`]; use
/// [`RowEncoder::new`] to have them rejected instead.
pub fn encode_row(fields: &[Value], delimiter: char) -> String {
    RowEncoder::new(delimiter)
        .unwrap_or_default()
        .encode(fields)
}

/// Text form of a single field before quoting.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) if map.is_empty() => String::new(),
        Value::Array(items) if items.is_empty() => String::new(),
        composite => composite.to_string(),
    }
}
