//! Call-site attribution.
//!
//! The default path is compile-time: logging entry points are
//! `#[track_caller]`, so [`Location::caller`] already points at the user's
//! call expression. Resolution is pluggable through [`CallSiteResolver`];
//! [`BacktraceResolver`] walks the runtime call chain instead, which only
//! yields file and line when debug info is present.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

/// Symbol prefixes skipped by [`BacktraceResolver`] unless overridden.
pub const DEFAULT_SKIP_PREFIXES: &[&str] = &[
    concat!(env!("CARGO_CRATE_NAME"), "::"),
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
    "__rust",
    "rust_begin_unwind",
];

/// Source file (base name only) and line of a logging call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub file: Cow<'static, str>,
    pub line: u32,
}

impl CallSite {
    pub const UNKNOWN_FILE: &'static str = "unknown";

    pub fn new(file: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Fallback used whenever resolution fails.
    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN_FILE, 0)
    }

    pub fn is_unknown(&self) -> bool {
        self.file == Self::UNKNOWN_FILE && self.line == 0
    }

    pub fn from_location(location: &'static Location<'static>) -> Self {
        match base_name(location.file()) {
            "" => Self::unknown(),
            file => Self::new(file, location.line()),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Call site of whoever called this function.
#[track_caller]
pub fn resolve() -> CallSite {
    CallSite::from_location(Location::caller())
}

/// Turns the compiler-captured location of a logging call into a [`CallSite`].
pub trait CallSiteResolver: Send + Sync {
    fn resolve(&self, location: &'static Location<'static>) -> CallSite;
}

/// Uses the `#[track_caller]` location as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackCaller;

impl CallSiteResolver for TrackCaller {
    fn resolve(&self, location: &'static Location<'static>) -> CallSite {
        CallSite::from_location(location)
    }
}

impl<F> CallSiteResolver for F
where
    F: Fn(&'static Location<'static>) -> CallSite + Send + Sync,
{
    fn resolve(&self, location: &'static Location<'static>) -> CallSite {
        self(location)
    }
}

/// Resolves the call site from a runtime backtrace.
///
/// Frames whose symbol starts with one of the skip prefixes (after any
/// leading `<` or `&`) are treated as library frames. The first other frame
/// decides the result.
#[derive(Debug, Clone)]
pub struct BacktraceResolver {
    skip_prefixes: Vec<String>,
}

impl BacktraceResolver {
    pub fn new() -> Self {
        Self {
            skip_prefixes: DEFAULT_SKIP_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Also skip frames from `prefix`, e.g. an application's own logging wrapper.
    pub fn skip(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefixes.push(prefix.into());
        self
    }

    pub fn capture(&self) -> CallSite {
        let backtrace = Backtrace::force_capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return CallSite::unknown();
        }
        parse_backtrace(&backtrace.to_string(), &self.skip_prefixes)
    }
}

impl Default for BacktraceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CallSiteResolver for BacktraceResolver {
    fn resolve(&self, _location: &'static Location<'static>) -> CallSite {
        self.capture()
    }
}

/// Find the first non-library frame in a rendered backtrace.
///
/// Expects the std rendering:
///
/// ```text
///    3: my_app::handler
///              at ./src/handler.rs:42:9
/// ```
///
/// Anything it cannot make sense of yields [`CallSite::unknown`].
pub fn parse_backtrace<S: AsRef<str>>(text: &str, skip_prefixes: &[S]) -> CallSite {
    let mut candidate = false;

    for line in text.lines().map(str::trim) {
        if let Some(symbol) = frame_symbol(line) {
            if candidate {
                // The chosen frame had no source location
                return CallSite::unknown();
            }
            candidate = !is_library_frame(symbol, skip_prefixes);
        } else if candidate {
            if let Some(location) = line.strip_prefix("at ") {
                return parse_location(location).unwrap_or_else(CallSite::unknown);
            }
        }
    }

    CallSite::unknown()
}

fn frame_symbol(line: &str) -> Option<&str> {
    let (index, symbol) = line.split_once(": ")?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(symbol.trim())
}

fn is_library_frame<S: AsRef<str>>(symbol: &str, skip_prefixes: &[S]) -> bool {
    let symbol = symbol.trim_start_matches(&['<', '&'][..]);
    skip_prefixes
        .iter()
        .any(|prefix| symbol.starts_with(prefix.as_ref()))
}

/// Parse `path:line[:column]`.
fn parse_location(location: &str) -> Option<CallSite> {
    let mut parts = location.trim().rsplitn(3, ':');
    let last = parts.next()?;
    let middle = parts.next()?;
    let (path, line) = match parts.next() {
        Some(path) => (path, middle),
        None => (middle, last),
    };

    let line: u32 = line.parse().ok()?;
    let file = base_name(path);
    if file.is_empty() {
        return None;
    }
    Some(CallSite::new(file.to_owned(), line))
}

fn base_name(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}
