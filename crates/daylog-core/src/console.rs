//! Colorized console output.

use std::fmt;
use std::path::Path;

use console::{style, Term};

use crate::record::LogRecord;

/// Color `line` according to `tag`; unknown tags pass through unchanged.
///
/// Colors are dropped automatically when stdout is not a terminal.
pub fn colorize(tag: &str, line: &str) -> String {
    let styled = style(line);
    let styled = match tag {
        "INFO" => styled.blue(),
        "DEBUG" => styled.black().bright(),
        "WARNING" => styled.yellow(),
        "ERROR" => styled.red(),
        _ => return line.to_string(),
    };
    styled.to_string()
}

/// Print `record` to stdout. Failures are ignored.
pub fn emit(record: &LogRecord) {
    let line = colorize(record.level.tag(), &record.console_line());
    let _ = Term::stdout().write_line(&line);
}

/// Text of a storage failure report.
pub fn failure_line(what: &str, path: &Path, error: &dyn fmt::Display) -> String {
    format!("daylog: {what} {}: {error}", path.display())
}

/// Report a storage failure on stderr.
///
/// Skipped once a global tracing subscriber is installed, since the
/// `error!` event emitted alongside already reaches it.
pub(crate) fn report_failure(what: &str, path: &Path, error: &dyn fmt::Display) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let line = style(failure_line(what, path, error)).for_stderr().red();
    let _ = Term::stderr().write_line(&line.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;

    #[test]
    fn test_colorize_keeps_text() {
        for tag in ["INFO", "DEBUG", "WARNING", "ERROR"] {
            let out = colorize(tag, "INFO, hello");
            assert!(out.contains("INFO, hello"), "{tag}: {out:?}");
        }
    }

    #[test]
    fn test_colorize_unknown_tag_passthrough() {
        assert_eq!(colorize("TRACE", "TRACE, hello"), "TRACE, hello");
    }

    #[test]
    fn test_colorize_forced_colors() {
        console::set_colors_enabled(true);
        let out = colorize("ERROR", "ERROR, boom");
        assert!(out.starts_with("\u{1b}["));
        assert!(out.contains("ERROR, boom"));
    }

    #[test]
    fn test_failure_line_names_path_and_cause() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "no space left");
        let line = failure_line("failed to flush log file", Path::new("/var/log/2024-03-01.csv"), &err);
        assert_eq!(
            line,
            "daylog: failed to flush log file /var/log/2024-03-01.csv: no space left"
        );
    }

    #[test]
    fn test_emit_does_not_panic() {
        emit(&LogRecord::new("2024-03-01T00:00:00.000Z", Level::Debug, "quiet"));
    }
}
