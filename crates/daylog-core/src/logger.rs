//! The logging façade.
//!
//! A [`Logger`] turns each call into a [`LogRecord`], prints it to the
//! console and appends it to `<log_dir>/<YYYY-MM-DD>.csv`. The file for the
//! current date is held open by one [`AppendWriter`]; when the clock crosses
//! into a new date the logger opens the new day's file and retires the old
//! writer.
//!
//! ```ignore
//! use daylog_core::{create_logger, LoggerOptions};
//! use serde_json::json;
//!
//! let logger = create_logger(LoggerOptions::default())?;
//! logger.info("service started");
//! logger.warn_with("slow response", json!({"ms": 1250}));
//! logger.close()?;
//! ```

use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error};

use crate::caller::{CallSiteResolver, TrackCaller};
use crate::clock::{format_date, format_timestamp, Clock, SystemClock};
use crate::config::LoggerOptions;
use crate::console;
use crate::csv::RowEncoder;
use crate::error::{LogError, LogResult};
use crate::record::{Level, LogRecord};
use crate::shutdown::{ShutdownCoordinator, WriterId};
use crate::writer::AppendWriter;

/// Extension of the daily log files.
pub const LOG_FILE_EXTENSION: &str = "csv";

/// Path of the log file for `date` (`YYYY-MM-DD`) inside `log_dir`.
pub fn log_file_path(log_dir: &Path, date: &str) -> PathBuf {
    log_dir.join(format!("{date}.{LOG_FILE_EXTENSION}"))
}

/// Build a logger from `options` with the system clock, `#[track_caller]`
/// attribution and the global shutdown coordinator.
pub fn create_logger(options: LoggerOptions) -> LogResult<Logger> {
    Logger::builder().options(options).build()
}

/// The writer for one date.
struct ActiveFile {
    date: String,
    writer: Arc<AppendWriter>,
    id: WriterId,
}

/// Leveled logger writing daily CSV files.
pub struct Logger {
    log_dir: PathBuf,
    options: LoggerOptions,
    encoder: RowEncoder,
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn CallSiteResolver>,
    coordinator: Arc<ShutdownCoordinator>,

    /// `None` once closed
    active: Mutex<Option<ActiveFile>>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    #[track_caller]
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message.as_ref(), None);
    }

    #[track_caller]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message.as_ref(), None);
    }

    #[track_caller]
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message.as_ref(), None);
    }

    #[track_caller]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message.as_ref(), None);
    }

    #[track_caller]
    pub fn info_with(&self, message: impl AsRef<str>, metadata: Value) {
        self.log(Level::Info, message.as_ref(), Some(&metadata));
    }

    #[track_caller]
    pub fn warn_with(&self, message: impl AsRef<str>, metadata: Value) {
        self.log(Level::Warn, message.as_ref(), Some(&metadata));
    }

    #[track_caller]
    pub fn error_with(&self, message: impl AsRef<str>, metadata: Value) {
        self.log(Level::Error, message.as_ref(), Some(&metadata));
    }

    #[track_caller]
    pub fn debug_with(&self, message: impl AsRef<str>, metadata: Value) {
        self.log(Level::Debug, message.as_ref(), Some(&metadata));
    }

    /// Log `message` at `level`.
    ///
    /// Never fails: storage problems are reported through `tracing` (or on
    /// stderr when no subscriber is installed) and the console line is
    /// printed regardless.
    #[track_caller]
    pub fn log(&self, level: Level, message: &str, metadata: Option<&Value>) {
        let location = Location::caller();
        let now = self.clock.now();

        let mut record = LogRecord::new(format_timestamp(&now), level, message);
        if self.options.caller_info {
            record = record.with_call_site(self.resolver.resolve(location));
        }
        if let Some(metadata) = metadata {
            record = record.with_metadata(metadata.clone());
        }

        if self.options.console {
            console::emit(&record);
        }
        self.append(&record, &now);
    }

    /// Append an already built record to the log file, without console output.
    ///
    /// `at` is the instant the record's timestamp was taken from; it picks
    /// the file, so a record never lands in a different day than it names.
    pub fn write_record(&self, record: &LogRecord, at: &DateTime<Utc>) {
        self.append(record, at);
    }

    /// Block until every record logged so far is on disk.
    pub fn flush(&self) -> LogResult<()> {
        let writer = self.active.lock().as_ref().map(|f| Arc::clone(&f.writer));
        match writer {
            Some(writer) if !writer.is_closed() => writer.flush(),
            _ => Ok(()),
        }
    }

    /// Flush and release the log file. Later calls do nothing.
    pub fn close(&self) -> LogResult<()> {
        let Some(file) = self.active.lock().take() else {
            return Ok(());
        };
        self.coordinator.deregister(file.id);
        file.writer.close()
    }

    pub fn is_closed(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(file) => file.writer.is_closed(),
            None => true,
        }
    }

    /// Absolute log directory.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// File currently receiving records, if still open.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.active
            .lock()
            .as_ref()
            .map(|f| f.writer.path().to_path_buf())
    }

    pub fn options(&self) -> &LoggerOptions {
        &self.options
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn append(&self, record: &LogRecord, now: &DateTime<Utc>) {
        let row = record.to_row(&self.encoder);

        let mut active = self.active.lock();
        let Some(current) = active.as_mut() else {
            debug!(level = %record.level, "logger closed, record dropped");
            return;
        };

        let date = format_date(now);
        if current.date != date {
            self.rotate(current, date);
        }

        match current.writer.write(row) {
            Ok(()) => {}
            Err(LogError::WriterClosed { path }) => {
                // Closed underneath us by the shutdown coordinator
                debug!(path = %path.display(), "log writer shut down, record dropped");
                self.coordinator.deregister(current.id);
                *active = None;
            }
            Err(e) => {
                error!(path = %current.writer.path().display(), error = %e, "failed to queue log record");
                console::report_failure("failed to queue log record", current.writer.path(), &e);
            }
        }
    }

    fn rotate(&self, current: &mut ActiveFile, date: String) {
        match open_file(&self.log_dir, date, &self.coordinator) {
            Ok(next) => {
                let previous = std::mem::replace(current, next);
                debug!(
                    from = %previous.date,
                    to = %current.date,
                    "rotating log file"
                );
                self.coordinator.deregister(previous.id);
                if let Err(e) = previous.writer.close() {
                    error!(path = %previous.writer.path().display(), error = %e, "failed to close rotated log file");
                    console::report_failure("failed to close rotated log file", previous.writer.path(), &e);
                }
            }
            Err(e) => {
                error!(error = %e, "cannot open log file for new date, keeping previous file");
                console::report_failure("cannot open log file for new date in", &self.log_dir, &e);
            }
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(dir = %self.log_dir.display(), error = %e, "failed to close logger");
            console::report_failure("failed to close logger for", &self.log_dir, &e);
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("log_dir", &self.log_dir)
            .field("options", &self.options)
            .field("current_path", &self.current_path())
            .finish_non_exhaustive()
    }
}

fn open_file(log_dir: &Path, date: String, coordinator: &ShutdownCoordinator) -> LogResult<ActiveFile> {
    let writer = Arc::new(AppendWriter::open(log_file_path(log_dir, &date))?);
    let id = coordinator.register(&writer);
    Ok(ActiveFile { date, writer, id })
}

fn resolve_dir(dir: &Path) -> LogResult<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| LogError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(dir))
}

/// Builder for [`Logger`].
#[derive(Default)]
pub struct LoggerBuilder {
    options: LoggerOptions,
    clock: Option<Arc<dyn Clock>>,
    resolver: Option<Arc<dyn CallSiteResolver>>,
    coordinator: Option<Arc<ShutdownCoordinator>>,
}

impl LoggerBuilder {
    /// Replace all options at once.
    pub fn options(mut self, options: LoggerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.options.log_dir = log_dir.into();
        self
    }

    pub fn caller_info(mut self, enabled: bool) -> Self {
        self.options.caller_info = enabled;
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.options.delimiter = delimiter;
        self
    }

    /// Disable or enable console output.
    pub fn console(mut self, enabled: bool) -> Self {
        self.options.console = enabled;
        self
    }

    pub fn handle_interrupt(mut self, enabled: bool) -> Self {
        self.options.handle_interrupt = enabled;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn resolver(mut self, resolver: impl CallSiteResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Register with `coordinator` instead of the global one.
    pub fn coordinator(mut self, coordinator: Arc<ShutdownCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Create the log directory, open today's file and register it for
    /// shutdown.
    pub fn build(self) -> LogResult<Logger> {
        let options = self.options;
        let encoder = RowEncoder::new(options.delimiter)?;

        let log_dir = resolve_dir(&options.log_dir)?;
        fs::create_dir_all(&log_dir).map_err(|source| LogError::CreateDir {
            path: log_dir.clone(),
            source,
        })?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let resolver = self.resolver.unwrap_or_else(|| Arc::new(TrackCaller));
        let coordinator = self.coordinator.unwrap_or_else(ShutdownCoordinator::global);

        let active = open_file(&log_dir, format_date(&clock.now()), &coordinator)?;
        if options.handle_interrupt {
            coordinator.enlist_for_interrupt();
        }

        debug!(dir = %log_dir.display(), "logger ready");

        Ok(Logger {
            log_dir,
            options,
            encoder,
            clock,
            resolver,
            coordinator,
            active: Mutex::new(Some(active)),
        })
    }
}
