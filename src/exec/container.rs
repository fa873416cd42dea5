// src/exec/container.rs

//! Container backend: runs a unit in a detached, auto-removed container.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::env::EnvMap;
use crate::errors::{Result, SkillrunError};
use crate::relay::{OutputRelay, StreamEnd};
use crate::sink::{LogLevel, LogSink};
use crate::types::{BackendKind, HostPlatform};

use super::backend::{ExecutionBackend, StartFuture};
use super::docker::{ContainerRuntime, ContainerSpec};
use super::network::{extra_hosts, rewrite_loopback};
use super::{Execution, ExecutionHandle, ExecutionOutcome, ExecutionRequest, UnitLayout};

/// Terminal line logged when a container's log stream ends normally.
pub const STREAM_CLOSED_MESSAGE: &str = "container log stream closed";

/// Container-specific settings, extracted once from [`Config`].
#[derive(Debug, Clone)]
pub struct ContainerSettings {
    pub layout: UnitLayout,
    pub image: String,
    pub interpreter: String,
    pub container_mount: String,
    pub url_key: String,
    pub secret_key: String,
    pub platform: HostPlatform,
}

impl ContainerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            layout: UnitLayout::from_config(&config.backend),
            image: config.backend.image.clone(),
            interpreter: config.backend.interpreter.clone(),
            container_mount: config.backend.container_mount.trim_end_matches('/').to_string(),
            url_key: config.service.url_key.clone(),
            secret_key: config.secrets.container_key.clone(),
            platform: HostPlatform::current(),
        }
    }

    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = platform;
        self
    }
}

pub struct ContainerBackend {
    runtime: Arc<dyn ContainerRuntime>,
    settings: ContainerSettings,
    ambient: EnvMap,
    sink: Arc<LogSink>,
}

impl fmt::Debug for ContainerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBackend")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ContainerBackend {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        settings: ContainerSettings,
        ambient: EnvMap,
        sink: Arc<LogSink>,
    ) -> Self {
        Self {
            runtime,
            settings,
            ambient,
            sink,
        }
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    /// Build the container description for `request`.
    ///
    /// The ambient value of the secret key, when set, replaces whatever the
    /// request carried for it. The service URL must be present; off Linux
    /// its loopback host is rewritten so the container can reach the host.
    pub fn container_spec(&self, request: &ExecutionRequest) -> Result<ContainerSpec> {
        let s = &self.settings;
        let unit = request.unit_name();

        s.layout.resolve(request.command_ref())?;

        let mut env = request.environment().clone();
        if let Some(secret) = self.ambient.get(&s.secret_key) {
            env.insert(s.secret_key.clone(), secret.clone());
        }

        let url = env.get_mut(&s.url_key).ok_or_else(|| {
            SkillrunError::start_failure(
                unit,
                format!("environment is missing the service address '{}'", s.url_key),
            )
        })?;
        *url = rewrite_loopback(url, s.platform);

        let host_dir = s.layout.absolute_skills_dir()?;
        let script = format!(
            "{}/{}/{}",
            s.container_mount,
            request.command_ref(),
            s.layout.entry_file()
        );

        Ok(ContainerSpec {
            unit: unit.to_string(),
            image: s.image.clone(),
            cmd: vec![s.interpreter.clone(), script],
            env,
            binds: vec![format!("{}:{}:ro", host_dir.display(), s.container_mount)],
            extra_hosts: extra_hosts(s.platform),
            auto_remove: true,
        })
    }

    async fn start_unit(&self, request: ExecutionRequest) -> Result<Execution> {
        let spec = self.container_spec(&request)?;
        let unit = spec.unit.clone();

        info!(unit = %unit, image = %spec.image, "starting container from image");
        let id = self.runtime.run_detached(spec).await?;
        debug!(unit = %unit, container = %id, "container running");

        let logs = self.runtime.follow_logs(&id);
        let relay = OutputRelay::new(Arc::clone(&self.sink), unit);
        let handle = ExecutionHandle::new(id, BackendKind::Container);

        let supervisor = tokio::spawn(async move {
            match relay.drain_stream(logs).await {
                StreamEnd::Closed { lines } => {
                    debug!(unit = %relay.unit(), lines, "container log stream drained");
                    relay.emit(LogLevel::Info, STREAM_CLOSED_MESSAGE);
                    ExecutionOutcome::LogStreamClosed
                }
                StreamEnd::Interrupted { reason, .. } => {
                    relay.emit(
                        LogLevel::Error,
                        format!("container log stream ended abnormally: {reason}"),
                    );
                    ExecutionOutcome::LogStreamInterrupted
                }
            }
        });

        Ok(Execution::new(handle, supervisor))
    }
}

impl ExecutionBackend for ContainerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Container
    }

    fn start(&self, request: ExecutionRequest) -> StartFuture<'_> {
        Box::pin(self.start_unit(request))
    }
}
