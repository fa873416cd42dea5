// src/config/validate.rs

use std::path::{Component, Path};

use crate::config::model::{Config, RawConfigFile};
use crate::errors::{Result, SkillrunError};

impl TryFrom<RawConfigFile> for Config {
    type Error = SkillrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_backend(cfg)?;
    validate_log(cfg)?;
    validate_units(cfg)?;
    Ok(())
}

fn validate_backend(cfg: &RawConfigFile) -> Result<()> {
    let backend = &cfg.backend;

    if backend.max_concurrent == 0 {
        return Err(config_error("[backend].max_concurrent must be >= 1 (got 0)"));
    }
    if backend.image.trim().is_empty() {
        return Err(config_error("[backend].image must not be empty"));
    }
    if backend.interpreter.trim().is_empty() {
        return Err(config_error("[backend].interpreter must not be empty"));
    }
    if !is_bare_segment(&backend.entry_file) {
        return Err(config_error(format!(
            "[backend].entry_file must be a plain file name (got '{}')",
            backend.entry_file
        )));
    }
    if !backend.container_mount.starts_with('/') {
        return Err(config_error(format!(
            "[backend].container_mount must be an absolute container path (got '{}')",
            backend.container_mount
        )));
    }
    if cfg.service.url_key.trim().is_empty() {
        return Err(config_error("[service].url_key must not be empty"));
    }

    Ok(())
}

fn validate_log(cfg: &RawConfigFile) -> Result<()> {
    if cfg.log.memory_capacity == 0 {
        return Err(config_error("[log].memory_capacity must be >= 1 (got 0)"));
    }
    if cfg.log.max_files == 0 {
        return Err(config_error("[log].max_files must be >= 1 (got 0)"));
    }
    if cfg.log.max_file_bytes == 0 {
        return Err(config_error("[log].max_file_bytes must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_units(cfg: &RawConfigFile) -> Result<()> {
    for (name, settings) in cfg.units.iter() {
        if !is_bare_segment(name) {
            return Err(config_error(format!(
                "unit name '{}' must be a single path segment",
                name
            )));
        }
        if let Some(env) = settings.get("env") {
            if !env.is_table() {
                return Err(config_error(format!(
                    "[units.{}].env must be a table",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// True when `name` is one normal path component (no separators, no `..`).
pub(crate) fn is_bare_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn config_error(msg: impl Into<String>) -> SkillrunError {
    SkillrunError::ConfigError(msg.into())
}
