//! Core record types for log analysis
//!
//! A `LogRecord` is one line of pipe-delimited log text after parsing. Records
//! live only for the duration of a single analysis call.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type for log records; log text carries no zone information
pub type Timestamp = NaiveDateTime;

/// A single parsed log line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    /// When the entry was written
    pub timestamp: Timestamp,
    /// Severity label from the second field
    pub level: LogLevel,
    /// Free text after the second delimiter
    pub message: String,
}

impl LogRecord {
    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }
}

/// Severity label of a log line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    /// Any label not recognised above, kept verbatim
    Other(String),
}

impl LogLevel {
    /// Parse a level label, ignoring case and surrounding whitespace
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "WARN" | "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "CRITICAL" | "FATAL" => LogLevel::Critical,
            _ => LogLevel::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Critical => write!(f, "CRITICAL"),
            LogLevel::Other(label) => write!(f, "{}", label),
        }
    }
}
