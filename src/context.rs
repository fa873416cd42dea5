// src/context.rs

//! Process-wide service context.
//!
//! `AppContext` owns the one `LogSink` and the one `Backend` of the process
//! and is handed to whatever serves trigger and log requests. It also
//! bounds how many units may run at once.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::env::{self, EnvMap, EnvironmentAssembler, overlay};
use crate::errors::{Result, SkillrunError};
use crate::exec::{Backend, Execution, ExecutionBackend, ExecutionRequest, select_backend};
use crate::sink::{LogLine, LogSink};
use crate::types::BackendKind;

#[derive(Debug)]
pub struct AppContext {
    config: Arc<Config>,
    sink: Arc<LogSink>,
    backend: Backend,
    assembler: EnvironmentAssembler,
    limiter: Arc<Semaphore>,
    max_concurrent: usize,
}

impl AppContext {
    /// Select the backend (once) and build the context around it.
    pub async fn initialise(config: Config, sink: Arc<LogSink>) -> Self {
        let backend = select_backend(&config, env::ambient(), Arc::clone(&sink)).await;
        Self::with_backend(config, sink, backend)
    }

    /// Build a context around an already selected backend.
    pub fn with_backend(config: Config, sink: Arc<LogSink>, backend: Backend) -> Self {
        let max_concurrent = config.backend.max_concurrent.max(1);
        Self {
            assembler: EnvironmentAssembler::from_config(&config),
            config: Arc::new(config),
            sink,
            backend,
            limiter: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Units currently holding a run slot.
    pub fn running(&self) -> usize {
        self.max_concurrent - self.limiter.available_permits()
    }

    /// The request `trigger` would start, without starting it.
    pub fn request_for(&self, unit: &str, overrides: &EnvMap) -> ExecutionRequest {
        let extra = self.unit_extra(unit, overrides);
        ExecutionRequest::for_unit(unit, overlay(self.assembler.base(), &extra))
    }

    /// Start `unit` with its configured environment plus `overrides`.
    pub async fn trigger(&self, unit: &str, overrides: &EnvMap) -> Result<Execution> {
        let extra = self.unit_extra(unit, overrides);
        self.start_execution(unit, self.assembler.base(), &extra)
            .await
    }

    /// Secrets and unit settings with caller `overrides` on top.
    fn unit_extra(&self, unit: &str, overrides: &EnvMap) -> EnvMap {
        overlay(
            &self.assembler.extra_for(self.config.unit_settings(unit)),
            overrides,
        )
    }

    /// Start `unit` with `extra_env` laid over `base_env`.
    ///
    /// Returns as soon as the unit is running. The run slot taken here is
    /// released when the unit's output is fully drained.
    pub async fn start_execution(
        &self,
        unit: &str,
        base_env: &EnvMap,
        extra_env: &EnvMap,
    ) -> Result<Execution> {
        let permit = Arc::clone(&self.limiter)
            .try_acquire_owned()
            .map_err(|_| SkillrunError::CapacityExhausted {
                limit: self.max_concurrent,
            })?;

        let request = ExecutionRequest::for_unit(unit, overlay(base_env, extra_env));

        match self.backend.start(request).await {
            Ok(execution) => {
                info!(
                    unit = %unit,
                    handle = %execution.id(),
                    backend = %self.backend.kind(),
                    "unit started"
                );
                Ok(execution.hold(permit))
            }
            Err(e) => {
                warn!(unit = %unit, error = %e, "unit could not be started");
                Err(e)
            }
        }
    }

    /// Newest `limit` log lines, oldest first.
    pub fn logs(&self, limit: usize) -> Vec<LogLine> {
        self.sink.query(limit)
    }

    /// Empty the in-memory log buffer.
    pub fn clear_logs(&self) {
        self.sink.clear();
    }
}
