#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use skillrun::config::{Config, RawConfigFile};
use skillrun::sink::LogSink;
use tempfile::TempDir;

/// Scratch skills tree: one directory per unit holding a `main.sh`.
pub struct SkillTree {
    dir: TempDir,
}

impl SkillTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp skills dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `<root>/<name>/main.sh` with the given shell body.
    pub fn unit(self, name: &str, script: &str) -> Self {
        let unit_dir = self.dir.path().join(name);
        std::fs::create_dir_all(&unit_dir).expect("failed to create unit dir");
        std::fs::write(unit_dir.join("main.sh"), script).expect("failed to write unit script");
        self
    }

    /// Durable log file path configured by [`ConfigBuilder`].
    pub fn log_file(&self) -> PathBuf {
        self.dir.path().join("logs").join("skillrun.log")
    }
}

impl Default for SkillTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Config` pointed at a [`SkillTree`] and running units with `sh`.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new(tree: &SkillTree) -> Self {
        let mut config = RawConfigFile::default();
        config.backend.use_mock = true;
        config.backend.skills_dir = tree.path().to_path_buf();
        config.backend.entry_file = "main.sh".to_string();
        config.backend.interpreter = "sh".to_string();
        config.backend.work_dir = tree.path().to_path_buf();
        config.log.dir = tree.path().join("logs");
        Self { config }
    }

    pub fn use_mock(mut self, val: bool) -> Self {
        self.config.backend.use_mock = val;
        self
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.config.backend.max_concurrent = n;
        self
    }

    pub fn service_url(mut self, url: &str) -> Self {
        self.config.service.url = url.to_string();
        self
    }

    pub fn secret(mut self, key: &str, value: &str) -> Self {
        self.config
            .secrets
            .values
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Add `[units.<name>]` from a TOML snippet.
    pub fn unit_settings(mut self, name: &str, toml_src: &str) -> Self {
        let table: toml::Table = toml::from_str(toml_src).expect("invalid unit settings TOML");
        self.config.units.insert(name.to_string(), table);
        self
    }

    pub fn memory_capacity(mut self, n: usize) -> Self {
        self.config.log.memory_capacity = n;
        self
    }

    pub fn build(self) -> Config {
        Config::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Sink writing to the config's durable log file.
pub fn file_sink(config: &Config) -> Arc<LogSink> {
    Arc::new(LogSink::new(&config.log))
}

/// Sink kept in memory only.
pub fn memory_sink(capacity: usize) -> Arc<LogSink> {
    Arc::new(LogSink::in_memory(capacity))
}
