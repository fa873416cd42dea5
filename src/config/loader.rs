// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::model::{Config, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a config file without validating it.
///
/// A missing file is not an error: the service runs on defaults, exactly as
/// when every section is omitted.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "no config file found; using defaults");
        return Ok(RawConfigFile::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    info!(path = %path.display(), "loaded config");

    Ok(config)
}

/// Load a config file, apply environment overrides and validate.
///
/// This is the entry point the rest of the application uses. The result is
/// read once at startup and never reloaded.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let mut raw = load_from_path(&path)?;
    apply_env_overrides(&mut raw, |key| std::env::var(key).ok());
    Config::try_from(raw)
}

/// Apply the supported environment overrides on top of the file values.
///
/// - `USE_MOCK_DOCKER`: `"true"` / `"false"` (case-insensitive)
/// - `SKILLRUN_IMAGE`: container image
/// - `SKILLRUN_SERVICE_URL`: service-discovery URL handed to units
pub fn apply_env_overrides<F>(raw: &mut RawConfigFile, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("USE_MOCK_DOCKER") {
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => raw.backend.use_mock = true,
            "false" | "0" | "no" => raw.backend.use_mock = false,
            other => warn!(value = %other, "ignoring unrecognised USE_MOCK_DOCKER value"),
        }
    }

    if let Some(image) = lookup("SKILLRUN_IMAGE") {
        raw.backend.image = image;
    }

    if let Some(url) = lookup("SKILLRUN_SERVICE_URL") {
        raw.service.url = url;
    }
}

/// Resolve the config path when none was given on the command line.
///
/// `SKILLRUN_CONFIG` wins; otherwise `Skillrun.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    std::env::var_os("SKILLRUN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Skillrun.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_and_validate(dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.backend.image, "contex-brain:latest");
        assert_eq!(cfg.service.url_key, "SIDECAR_URL");
        assert!(cfg.units.is_empty());
    }

    #[test]
    fn parses_sections_and_unit_tables() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[backend]
use_mock = false
image = "brain:dev"
max_concurrent = 2

[secrets]
values = {{ GOOGLE_API_KEY = "k-123" }}

[units.daily-brief]
topics = ["AI", "Rust"]
max_results = 3

[units.daily-brief.env]
TOPIC_COUNT = 3
"#
        )
        .unwrap();

        let raw = load_from_path(file.path()).unwrap();
        assert!(!raw.backend.use_mock);
        assert_eq!(raw.backend.image, "brain:dev");
        assert_eq!(raw.backend.max_concurrent, 2);
        assert_eq!(raw.backend.entry_file, "main.py");
        assert_eq!(raw.secrets.values.get("GOOGLE_API_KEY").unwrap(), "k-123");

        let unit = raw.units.get("daily-brief").unwrap();
        assert_eq!(unit.get("max_results").unwrap().as_integer(), Some(3));
        assert!(unit.get("env").unwrap().is_table());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut raw = RawConfigFile::default();
        let vars: HashMap<&str, &str> = [
            ("USE_MOCK_DOCKER", "FALSE"),
            ("SKILLRUN_IMAGE", "other:1"),
            ("SKILLRUN_SERVICE_URL", "http://localhost:9000"),
        ]
        .into_iter()
        .collect();

        apply_env_overrides(&mut raw, |k| vars.get(k).map(|v| v.to_string()));

        assert!(!raw.backend.use_mock);
        assert_eq!(raw.backend.image, "other:1");
        assert_eq!(raw.service.url, "http://localhost:9000");
    }

    #[test]
    fn unknown_mock_flag_is_ignored() {
        let mut raw = RawConfigFile::default();
        apply_env_overrides(&mut raw, |k| {
            (k == "USE_MOCK_DOCKER").then(|| "maybe".to_string())
        });
        assert!(raw.backend.use_mock);
    }
}
