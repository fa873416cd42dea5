// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Runtime failures of a launched unit (non-zero exit, a log stream that
//! ends abnormally) are deliberately absent: they happen after `start` has
//! returned and are only ever reported as log lines.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkillrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Container runtime unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Failed to start unit '{unit}': {reason}")]
    StartFailure { unit: String, reason: String },

    #[error("Too many running units (limit {limit})")]
    CapacityExhausted { limit: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SkillrunError {
    pub fn start_failure(unit: impl Into<String>, reason: impl ToString) -> Self {
        SkillrunError::StartFailure {
            unit: unit.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP-equivalent status class for the control surface.
    pub fn status_code(&self) -> u16 {
        match self {
            SkillrunError::UnitNotFound(_) => 404,
            SkillrunError::CapacityExhausted { .. } => 429,
            SkillrunError::BackendUnavailable(_) => 503,
            _ => 500,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SkillrunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(SkillrunError::UnitNotFound("x".into()).status_code(), 404);
        assert_eq!(SkillrunError::start_failure("x", "boom").status_code(), 500);
        assert_eq!(
            SkillrunError::CapacityExhausted { limit: 2 }.status_code(),
            429
        );
    }

    #[test]
    fn start_failure_message_names_unit() {
        let err = SkillrunError::start_failure("daily-brief", "no such file");
        assert_eq!(
            err.to_string(),
            "Failed to start unit 'daily-brief': no such file"
        );
    }
}
