// src/sink/line.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Component tag for every line relayed from a launched unit.
pub const EXECUTION_COMPONENT: &str = "execution";

/// Severity of a stored log line.
///
/// Unit output only ever uses `Info` (stdout / container logs) and `Error`
/// (stderr, failures). `Warn` is reserved for host-service events such as
/// a backend fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    #[serde(alias = "WARNING")]
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.pad("INFO"),
            LogLevel::Warn => f.pad("WARN"),
            LogLevel::Error => f.pad("ERROR"),
        }
    }
}

/// One structured entry in the log sink.
///
/// Serialised as a single JSON object per line in the durable file:
/// `{"timestamp":..,"level":"INFO","component":"execution","unit":"daily-brief","message":".."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    #[serde(rename = "unit", default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    #[serde(rename = "message")]
    pub text: String,
}

impl LogLine {
    /// A line produced by (or about) a launched unit.
    pub fn unit(level: LogLevel, unit_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: EXECUTION_COMPONENT.to_string(),
            unit_name: Some(unit_name.into()),
            text: text.into(),
        }
    }

    /// A line produced by the host service itself.
    pub fn host(level: LogLevel, component: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.into(),
            unit_name: None,
            text: text.into(),
        }
    }

    pub fn is_from_unit(&self, unit_name: &str) -> bool {
        self.unit_name.as_deref() == Some(unit_name)
    }
}
