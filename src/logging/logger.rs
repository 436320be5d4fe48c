//! Serial-numbered, leveled logger
//!
//! Every record gets a serial number from the logger instance that produced it.
//! Clones share the counter; separately constructed loggers count independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub serial: u64,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub context: Option<Value>,
}

/// Destination for log records
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

/// Forwards records to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let context = record
            .context
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default();

        match record.level {
            LogLevel::Info => {
                tracing::info!(serial = record.serial, context = %context, "{}", record.message)
            }
            LogLevel::Warn => {
                tracing::warn!(serial = record.serial, context = %context, "{}", record.message)
            }
            LogLevel::Error => {
                tracing::error!(serial = record.serial, context = %context, "{}", record.message)
            }
        }
    }
}

/// Keeps records in memory, for tests and for surfacing diagnostics in a UI
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of records at `level`
    pub fn count(&self, level: LogLevel) -> usize {
        self.records().iter().filter(|r| r.level == level).count()
    }

    /// Whether any record at `level` contains `needle` in its message
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Leveled logger with per-instance serial numbers
#[derive(Clone)]
pub struct CaptureLogger {
    serial: Arc<AtomicU64>,
    sink: Arc<dyn LogSink>,
}

impl CaptureLogger {
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self {
            serial: Arc::new(AtomicU64::new(0)),
            sink: Arc::new(sink),
        }
    }

    /// Logger that writes through `tracing`
    pub fn tracing() -> Self {
        Self::new(TracingSink)
    }

    /// Emit a record and return its serial number
    pub fn log(&self, level: LogLevel, message: impl Into<String>, context: Option<Value>) -> u64 {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let record = LogRecord {
            serial,
            level,
            timestamp: Utc::now(),
            message: message.into(),
            context,
        };
        self.sink.emit(&record);
        serial
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.log(LogLevel::Info, message, None)
    }

    pub fn info_with(&self, message: impl Into<String>, context: Value) -> u64 {
        self.log(LogLevel::Info, message, Some(context))
    }

    pub fn warn(&self, message: impl Into<String>) -> u64 {
        self.log(LogLevel::Warn, message, None)
    }

    pub fn warn_with(&self, message: impl Into<String>, context: Value) -> u64 {
        self.log(LogLevel::Warn, message, Some(context))
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.log(LogLevel::Error, message, None)
    }

    pub fn error_with(&self, message: impl Into<String>, context: Value) -> u64 {
        self.log(LogLevel::Error, message, Some(context))
    }
}

impl Default for CaptureLogger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for CaptureLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureLogger")
            .field("serial", &self.serial.load(Ordering::SeqCst))
            .finish()
    }
}
