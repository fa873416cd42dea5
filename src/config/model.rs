// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Configuration as read from `Skillrun.toml`, before validation.
///
/// ```toml
/// [backend]
/// use_mock = false
/// image = "contex-brain:latest"
/// skills_dir = "packages/skills"
///
/// [service]
/// url = "http://127.0.0.1:12345"
///
/// [secrets]
/// container_key = "GOOGLE_API_KEY"
/// values = { GOOGLE_API_KEY = "..." }
///
/// [units.daily-brief]
/// topics = ["AI", "Rust"]
/// env = { TOPIC_COUNT = 3 }
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Per-unit settings from `[units.<name>]`.
    #[serde(default)]
    pub units: BTreeMap<String, toml::Table>,
}

/// Validated configuration; only constructible through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub service: ServiceConfig,
    pub secrets: SecretsConfig,
    pub log: LogConfig,
    pub units: BTreeMap<String, toml::Table>,
}

impl Config {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            backend: raw.backend,
            service: raw.service,
            secrets: raw.secrets,
            log: raw.log,
            units: raw.units,
        }
    }

    /// Settings table for one unit, if configured.
    pub fn unit_settings(&self, unit: &str) -> Option<&toml::Table> {
        self.units.get(unit)
    }
}

/// `[backend]` section. Resolved once by the backend selector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Run units as local child processes instead of containers.
    pub use_mock: bool,

    /// Image used by the container backend.
    pub image: String,

    /// Host directory holding one subdirectory per unit.
    pub skills_dir: PathBuf,

    /// File inside a unit directory that is executed.
    pub entry_file: String,

    /// Program used to run the entry file (locally and in the container).
    pub interpreter: String,

    /// Where `skills_dir` is mounted (read-only) inside the container.
    pub container_mount: String,

    /// Working directory for local units; relative library paths resolve
    /// against it.
    pub work_dir: PathBuf,

    /// Environment variable extended with `library_paths` for local units.
    pub library_path_var: String,

    /// Directories prepended to `library_path_var`.
    pub library_paths: Vec<PathBuf>,

    /// Upper bound on units running at the same time.
    pub max_concurrent: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            use_mock: true,
            image: "contex-brain:latest".to_string(),
            skills_dir: PathBuf::from("packages/skills"),
            entry_file: "main.py".to_string(),
            interpreter: "python3".to_string(),
            container_mount: "/app/skills".to_string(),
            work_dir: PathBuf::from("."),
            library_path_var: "PYTHONPATH".to_string(),
            library_paths: vec![PathBuf::from("."), PathBuf::from("packages")],
            max_concurrent: 4,
        }
    }
}

/// `[service]` section: how a launched unit reaches this service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Environment key carrying the service base URL.
    pub url_key: String,
    pub url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url_key: "SIDECAR_URL".to_string(),
            url: "http://127.0.0.1:12345".to_string(),
        }
    }
}

/// `[secrets]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Key copied from the ambient environment into every container.
    pub container_key: String,

    /// Global secrets injected into every unit.
    pub values: BTreeMap<String, String>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            container_key: "GOOGLE_API_KEY".to_string(),
            values: BTreeMap::new(),
        }
    }
}

/// `[log]` section for the durable log sink.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub file: String,

    /// Entries kept in the in-memory ring buffer.
    pub memory_capacity: usize,

    /// Size at which the active file is rotated.
    pub max_file_bytes: u64,

    /// Number of files kept, including the active one.
    pub max_files: usize,
}

impl LogConfig {
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file: "skillrun.log".to_string(),
            memory_capacity: 1000,
            max_file_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}
