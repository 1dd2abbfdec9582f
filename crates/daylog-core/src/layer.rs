//! Tracing Layer that writes events to the daily CSV files.
//!
//! Lets applications keep using the `tracing` macros while the records end
//! up in the same files as direct [`Logger`] calls.
//!
//! ```ignore
//! use std::sync::Arc;
//! use daylog_core::{create_logger, CsvLayer, LoggerOptions};
//! use tracing_subscriber::prelude::*;
//!
//! let logger = Arc::new(create_logger(LoggerOptions::default())?);
//! tracing_subscriber::registry()
//!     .with(CsvLayer::new(logger))
//!     .with(tracing_subscriber::fmt::layer())
//!     .init();
//! ```

use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::caller::CallSite;
use crate::clock::format_timestamp;
use crate::logger::Logger;
use crate::record::{Level, LogRecord};

/// Events from this crate are not recorded, so a failing writer cannot
/// feed its own error reports back into itself.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// A tracing Layer that appends events through a [`Logger`].
pub struct CsvLayer {
    logger: Arc<Logger>,
}

impl CsvLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}

impl<S> Layer<S> for CsvLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own_target(metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let now = self.logger.clock().now();
        let mut record = LogRecord::new(
            format_timestamp(&now),
            Level::from(metadata.level()),
            visitor.message.unwrap_or_default(),
        );

        if self.logger.options().caller_info {
            let call_site = match (metadata.file(), metadata.line()) {
                (Some(file), Some(line)) => {
                    let file = file.rsplit(&['/', '\\'][..]).next().unwrap_or(file);
                    CallSite::new(file.to_owned(), line)
                }
                _ => CallSite::unknown(),
            };
            record = record.with_call_site(call_site);
        }

        if !visitor.fields.is_empty() {
            record = record.with_metadata(Value::Object(visitor.fields));
        }

        self.logger.write_record(&record, &now);
    }
}

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Collects the `message` field and everything else as JSON.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);

        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}
