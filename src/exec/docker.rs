// src/exec/docker.rs

//! Container daemon access.
//!
//! `ContainerRuntime` is the narrow seam the container backend and the
//! selector talk to. `DockerRuntime` implements it over the local Docker
//! daemon with `bollard`; tests substitute a scripted fake.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogOutput, LogsOptions,
    StartContainerOptions,
};
use bollard::models::HostConfig;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::debug;

use crate::env::EnvMap;
use crate::errors::{Result, SkillrunError};

pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Followed container output, one item per daemon frame.
pub type LogStream = BoxStream<'static, Result<String>>;

/// Label attached to every container started for a unit.
pub const UNIT_LABEL: &str = "skillrun.unit";

/// Everything needed to create one detached container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub unit: String,
    pub image: String,
    pub cmd: Vec<String>,
    pub env: EnvMap,
    /// `host_path:container_path[:mode]` bind mounts.
    pub binds: Vec<String>,
    /// `name:address` entries added to the container's hosts file.
    pub extra_hosts: Vec<String>,
    pub auto_remove: bool,
}

impl ContainerSpec {
    /// Environment in the daemon's `KEY=value` form.
    pub fn env_pairs(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

pub trait ContainerRuntime: Send + Sync {
    /// Health check; `Err` means the daemon cannot be used.
    fn ping(&self) -> RuntimeFuture<'_, ()>;

    /// Create and start a container; resolves to its id once running.
    fn run_detached(&self, spec: ContainerSpec) -> RuntimeFuture<'_, String>;

    /// Follow stdout and stderr of a running container until it exits.
    fn follow_logs(&self, container_id: &str) -> LogStream;
}

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using the platform's default socket or `DOCKER_HOST`.
    ///
    /// Connecting is lazy; call [`ContainerRuntime::ping`] to find out
    /// whether the daemon actually answers.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SkillrunError::BackendUnavailable(e.to_string()))?;
        Ok(Self { docker })
    }

    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

impl ContainerRuntime for DockerRuntime {
    fn ping(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            self.docker
                .ping()
                .await
                .map_err(|e| SkillrunError::BackendUnavailable(e.to_string()))?;
            Ok(())
        })
    }

    fn run_detached(&self, spec: ContainerSpec) -> RuntimeFuture<'_, String> {
        Box::pin(async move {
            let unit = spec.unit.clone();
            let config = ContainerConfig {
                image: Some(spec.image.clone()),
                cmd: Some(spec.cmd.clone()),
                env: Some(spec.env_pairs()),
                labels: Some(HashMap::from([(UNIT_LABEL.to_string(), unit.clone())])),
                host_config: Some(HostConfig {
                    binds: Some(spec.binds.clone()),
                    extra_hosts: (!spec.extra_hosts.is_empty()).then(|| spec.extra_hosts.clone()),
                    auto_remove: Some(spec.auto_remove),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let created = self
                .docker
                .create_container(None::<CreateContainerOptions<String>>, config)
                .await
                .map_err(|e| SkillrunError::start_failure(&unit, e))?;
            for warning in &created.warnings {
                debug!(unit = %unit, %warning, "daemon warning on create");
            }

            self.docker
                .start_container(&created.id, None::<StartContainerOptions<String>>)
                .await
                .map_err(|e| SkillrunError::start_failure(&unit, e))?;

            Ok(created.id)
        })
    }

    fn follow_logs(&self, container_id: &str) -> LogStream {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        self.docker
            .logs(container_id, Some(options))
            .map(|frame| {
                frame
                    .map(frame_text)
                    .map_err(|e| SkillrunError::Other(e.into()))
            })
            .boxed()
    }
}

fn frame_text(frame: LogOutput) -> String {
    String::from_utf8_lossy(&frame.into_bytes()).into_owned()
}
