// src/exec/mod.rs

//! Unit execution layer.
//!
//! - [`backend`] defines the `ExecutionBackend` capability and the closed
//!   `Backend` enum that the rest of the service holds.
//! - [`local`] runs a unit as a child process (`tokio::process::Command`).
//! - [`container`] runs a unit in a detached, auto-removed container.
//! - [`docker`] abstracts the container daemon behind `ContainerRuntime`,
//!   with a `bollard`-backed implementation.
//! - [`network`] holds the host/container address rewriting rules.
//! - [`selector`] picks the backend once at startup.
//!
//! Every `start` returns as soon as the unit is spawned. Output draining and
//! exit handling run on supervised Tokio tasks whose join handle lives in the
//! returned [`Execution`].

pub mod backend;
pub mod container;
pub mod docker;
pub mod local;
pub mod network;
pub mod selector;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::BackendConfig;
use crate::config::validate::is_bare_segment;
use crate::env::EnvMap;
use crate::errors::{Result, SkillrunError};
use crate::types::BackendKind;

pub use backend::{Backend, ExecutionBackend, StartFuture};
pub use container::{ContainerBackend, ContainerSettings};
pub use docker::{ContainerRuntime, ContainerSpec, DockerRuntime};
pub use local::LocalBackend;
pub use selector::{select_backend, select_backend_with};

/// Text carried by the terminal line of a unit that exited with code 0.
pub const SUCCESS_MARKER: &str = "finished successfully";
/// Text carried by the terminal line of a unit that exited non-zero.
pub const FAILURE_MARKER: &str = "failed with exit code";

/// What to run and with which environment.
///
/// `command_ref` names the unit directory under the skills tree; it is the
/// unit name unless a caller maps one unit onto another's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRequest {
    unit_name: String,
    command_ref: String,
    environment: EnvMap,
}

impl ExecutionRequest {
    pub fn new(
        unit_name: impl Into<String>,
        command_ref: impl Into<String>,
        environment: EnvMap,
    ) -> Self {
        Self {
            unit_name: unit_name.into(),
            command_ref: command_ref.into(),
            environment,
        }
    }

    /// Request whose `command_ref` is the unit name itself.
    pub fn for_unit(unit_name: impl Into<String>, environment: EnvMap) -> Self {
        let unit_name = unit_name.into();
        Self::new(unit_name.clone(), unit_name, environment)
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn command_ref(&self) -> &str {
        &self.command_ref
    }

    pub fn environment(&self) -> &EnvMap {
        &self.environment
    }
}

/// Identifies a started unit. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionHandle {
    pub id: String,
    pub backend_kind: BackendKind,
    pub started_at: DateTime<Utc>,
}

impl ExecutionHandle {
    pub fn new(id: impl Into<String>, backend_kind: BackendKind) -> Self {
        Self {
            id: id.into(),
            backend_kind,
            started_at: Utc::now(),
        }
    }
}

/// How a unit's supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Local process exited with code 0.
    Succeeded,
    /// Local process exited non-zero, was killed by a signal (`code: None`),
    /// or could not be waited on.
    Failed { code: Option<i32> },
    /// Container log stream reached its end.
    LogStreamClosed,
    /// Container log stream broke off with an error.
    LogStreamInterrupted,
}

impl ExecutionOutcome {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Succeeded | ExecutionOutcome::LogStreamClosed
        )
    }
}

/// Reply handed back to the trigger caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartResponse {
    pub status: String,
    pub handle_id: String,
    pub backend: BackendKind,
}

/// A started unit: its handle plus the supervisor task that drains its
/// output and observes its exit.
#[derive(Debug)]
pub struct Execution {
    handle: ExecutionHandle,
    supervisor: JoinHandle<ExecutionOutcome>,
}

impl Execution {
    pub fn new(handle: ExecutionHandle, supervisor: JoinHandle<ExecutionOutcome>) -> Self {
        Self { handle, supervisor }
    }

    pub fn handle(&self) -> &ExecutionHandle {
        &self.handle
    }

    pub fn id(&self) -> &str {
        &self.handle.id
    }

    pub fn response(&self) -> StartResponse {
        StartResponse {
            status: "started".to_string(),
            handle_id: self.handle.id.clone(),
            backend: self.handle.backend_kind,
        }
    }

    /// True once output is fully drained and the terminal line is logged.
    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Wait for the supervisor to finish.
    pub async fn wait(self) -> ExecutionOutcome {
        match self.supervisor.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(handle = %self.handle.id, error = %e, "execution supervisor did not complete");
                ExecutionOutcome::Failed { code: None }
            }
        }
    }

    /// Drop the join handle; the unit and its relay keep running.
    pub fn detach(self) -> ExecutionHandle {
        self.handle
    }

    /// Keep `guard` alive until the supervisor finishes.
    pub fn hold<G>(self, guard: G) -> Self
    where
        G: Send + 'static,
    {
        let Execution { handle, supervisor } = self;
        let supervisor = tokio::spawn(async move {
            let outcome = match supervisor.await {
                Ok(outcome) => outcome,
                Err(_) => ExecutionOutcome::Failed { code: None },
            };
            drop(guard);
            outcome
        });
        Execution { handle, supervisor }
    }
}

/// Where unit entry files live: `<skills_dir>/<unit>/<entry_file>`.
#[derive(Debug, Clone)]
pub struct UnitLayout {
    skills_dir: PathBuf,
    entry_file: String,
}

impl UnitLayout {
    pub fn new(skills_dir: impl Into<PathBuf>, entry_file: impl Into<String>) -> Self {
        Self {
            skills_dir: skills_dir.into(),
            entry_file: entry_file.into(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.skills_dir.clone(), config.entry_file.clone())
    }

    pub fn skills_dir(&self) -> &Path {
        &self.skills_dir
    }

    pub fn entry_file(&self) -> &str {
        &self.entry_file
    }

    /// Absolute path of the unit's entry file.
    ///
    /// Fails with `UnitNotFound` when the name is not a single path segment
    /// or the entry file does not exist.
    pub fn resolve(&self, unit: &str) -> Result<PathBuf> {
        if !is_bare_segment(unit) {
            return Err(SkillrunError::UnitNotFound(unit.to_string()));
        }

        let entry = self.skills_dir.join(unit).join(&self.entry_file);
        if !entry.is_file() {
            return Err(SkillrunError::UnitNotFound(unit.to_string()));
        }

        Ok(std::path::absolute(&entry)?)
    }

    /// Absolute skills directory, for bind mounts.
    pub fn absolute_skills_dir(&self) -> Result<PathBuf> {
        Ok(std::path::absolute(&self.skills_dir)?)
    }
}
