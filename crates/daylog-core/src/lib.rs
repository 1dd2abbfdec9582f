//! Daylog Core Library
//!
//! Leveled logging to the console and to one CSV file per UTC date.
//!
//! ## Overview
//!
//! Every call on a [`Logger`] produces one colorized console line and one
//! row appended to `<log_dir>/<YYYY-MM-DD>.csv`:
//!
//! ```text
//! 2024-03-01T12:34:56.789Z;INFO;order accepted (orders.rs:42);"{id:17}"
//! ```
//!
//! - **Non-blocking appends**: each file is owned by an [`AppendWriter`]
//!   whose background thread serializes writes from any number of callers.
//! - **Daily rotation**: a new file is opened when the date changes.
//! - **Call-site attribution**: logging methods are `#[track_caller]`, so
//!   rows name the file and line of the call.
//! - **Clean shutdown**: writers are registered with a
//!   [`ShutdownCoordinator`] that flushes them on Ctrl-C and at process
//!   exit.
//!
//! ## Quick Start
//!
//! ```ignore
//! use daylog_core::{create_logger, LoggerOptions};
//! use serde_json::json;
//!
//! fn main() -> Result<(), daylog_core::LogError> {
//!     let logger = create_logger(LoggerOptions::default())?;
//!
//!     logger.info("service started");
//!     logger.error_with("payment failed", json!({"order": 17, "retry": true}));
//!
//!     logger.close()
//! }
//! ```

pub mod caller;
pub mod clock;
pub mod config;
pub mod console;
pub mod csv;
pub mod error;
pub mod layer;
pub mod logger;
pub mod record;
pub mod shutdown;
pub mod writer;

// Re-exports
pub use caller::{BacktraceResolver, CallSite, CallSiteResolver, TrackCaller};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LoggerOptions;
pub use csv::{encode_row, RowEncoder, DEFAULT_DELIMITER};
pub use error::{LogError, LogResult};
pub use layer::CsvLayer;
pub use logger::{create_logger, log_file_path, Logger, LoggerBuilder};
pub use record::{Level, LogRecord};
pub use shutdown::{ShutdownCoordinator, WriterId};
pub use writer::AppendWriter;
