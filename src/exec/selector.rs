// src/exec/selector.rs

//! Startup-time choice between the container and local backends.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::env::EnvMap;
use crate::errors::Result;
use crate::sink::LogSink;

use super::backend::Backend;
use super::container::{ContainerBackend, ContainerSettings};
use super::docker::{ContainerRuntime, DockerRuntime};
use super::local::LocalBackend;

/// Pick the backend for this process, connecting to the local Docker daemon.
pub async fn select_backend(config: &Config, ambient: EnvMap, sink: Arc<LogSink>) -> Backend {
    select_backend_with(config, ambient, sink, || async {
        let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::connect()?);
        Ok(runtime)
    })
    .await
}

/// Pick the backend, obtaining the container runtime from `connect`.
///
/// - mock mode: local backend, `connect` is never called
/// - runtime connects and answers a ping: container backend
/// - otherwise: local backend, after exactly one warning naming the cause
pub async fn select_backend_with<F, Fut>(
    config: &Config,
    ambient: EnvMap,
    sink: Arc<LogSink>,
    connect: F,
) -> Backend
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<dyn ContainerRuntime>>>,
{
    if config.backend.use_mock {
        info!("mock mode enabled; units run as local processes");
        return LocalBackend::new(&config.backend, ambient, sink).into();
    }

    let health_check = async {
        let runtime = connect().await?;
        runtime.ping().await?;
        Ok::<_, crate::errors::SkillrunError>(runtime)
    };

    match health_check.await {
        Ok(runtime) => {
            info!(image = %config.backend.image, "container runtime reachable; units run in containers");
            let settings = ContainerSettings::from_config(config);
            ContainerBackend::new(runtime, settings, ambient, sink).into()
        }
        Err(e) => {
            warn!(error = %e, "container runtime unavailable; falling back to local processes");
            LocalBackend::new(&config.backend, ambient, sink).into()
        }
    }
}
