// src/exec/local.rs

//! Local-process backend: runs a unit's entry file as a child process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::env::{EnvMap, overlay};
use crate::errors::{Result, SkillrunError};
use crate::relay::OutputRelay;
use crate::sink::{LogLevel, LogSink};
use crate::types::BackendKind;

use super::backend::{ExecutionBackend, StartFuture};
use super::{
    Execution, ExecutionHandle, ExecutionOutcome, ExecutionRequest, FAILURE_MARKER,
    SUCCESS_MARKER, UnitLayout,
};

#[derive(Debug)]
pub struct LocalBackend {
    layout: UnitLayout,
    interpreter: String,
    work_dir: PathBuf,
    library_path_var: String,
    library_paths: Vec<PathBuf>,
    ambient: EnvMap,
    sink: Arc<LogSink>,
    next_id: AtomicU64,
}

impl LocalBackend {
    /// `ambient` is the environment every child starts from.
    pub fn new(config: &BackendConfig, ambient: EnvMap, sink: Arc<LogSink>) -> Self {
        Self {
            layout: UnitLayout::from_config(config),
            interpreter: config.interpreter.clone(),
            work_dir: config.work_dir.clone(),
            library_path_var: config.library_path_var.clone(),
            library_paths: config.library_paths.clone(),
            ambient,
            sink,
            next_id: AtomicU64::new(0),
        }
    }

    /// Environment the child process sees.
    ///
    /// Ambient variables first, then the library search path extended with
    /// the configured directories (ahead of any inherited entries), then the
    /// request environment, which wins on every collision.
    pub fn child_environment(&self, request: &ExecutionRequest) -> EnvMap {
        let mut env = self.ambient.clone();

        if !self.library_path_var.is_empty() {
            let inherited = env.get(&self.library_path_var).cloned().unwrap_or_default();
            match self.library_search_path(&inherited) {
                Some(joined) => {
                    env.insert(self.library_path_var.clone(), joined);
                }
                None => warn!(
                    var = %self.library_path_var,
                    "library path contains a separator character; leaving it unchanged"
                ),
            }
        }

        overlay(&env, request.environment())
    }

    fn library_search_path(&self, inherited: &str) -> Option<String> {
        let base = std::path::absolute(&self.work_dir).unwrap_or_else(|_| self.work_dir.clone());
        let mut dirs: Vec<PathBuf> = self.library_paths.iter().map(|p| base.join(p)).collect();
        if !inherited.is_empty() {
            dirs.extend(std::env::split_paths(inherited));
        }

        std::env::join_paths(dirs)
            .ok()
            .map(|joined| joined.to_string_lossy().into_owned())
    }

    fn next_handle_id(&self, unit: &str) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("local-{unit}-{seq}")
    }

    fn start_unit(&self, request: ExecutionRequest) -> Result<Execution> {
        let unit = request.unit_name().to_string();
        let entry = self.layout.resolve(request.command_ref())?;

        info!(unit = %unit, entry = %entry.display(), "simulating execution as local process");

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&entry)
            .current_dir(&self.work_dir)
            .env_clear()
            .envs(self.child_environment(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| SkillrunError::start_failure(&unit, e))?;

        let handle = ExecutionHandle::new(self.next_handle_id(&unit), BackendKind::Local);
        debug!(unit = %unit, handle = %handle.id, pid = ?child.id(), "local unit spawned");

        let relay = OutputRelay::new(Arc::clone(&self.sink), unit);
        let stdout = child
            .stdout
            .take()
            .map(|out| relay.spawn_reader(out, LogLevel::Info));
        let stderr = child
            .stderr
            .take()
            .map(|err| relay.spawn_reader(err, LogLevel::Error));

        let supervisor = tokio::spawn(supervise(child, stdout, stderr, relay));
        Ok(Execution::new(handle, supervisor))
    }
}

impl ExecutionBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn start(&self, request: ExecutionRequest) -> StartFuture<'_> {
        // Spawning is synchronous; the future only carries the result.
        let result = self.start_unit(request);
        Box::pin(async move { result })
    }
}

/// Wait for exit, join both readers, then log exactly one terminal line.
async fn supervise(
    mut child: Child,
    stdout: Option<JoinHandle<usize>>,
    stderr: Option<JoinHandle<usize>>,
    relay: OutputRelay,
) -> ExecutionOutcome {
    let status = child.wait().await;

    let stdout_lines = join_reader(stdout).await;
    let stderr_lines = join_reader(stderr).await;
    debug!(
        unit = %relay.unit(),
        stdout_lines,
        stderr_lines,
        "local unit output drained"
    );

    match status {
        Ok(status) if status.success() => {
            relay.emit(
                LogLevel::Info,
                format!("unit '{}' {SUCCESS_MARKER}", relay.unit()),
            );
            ExecutionOutcome::Succeeded
        }
        Ok(status) => {
            let code = status.code();
            let shown = code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string());
            relay.emit(
                LogLevel::Error,
                format!("unit '{}' {FAILURE_MARKER} {shown}", relay.unit()),
            );
            ExecutionOutcome::Failed { code }
        }
        Err(e) => {
            relay.emit(
                LogLevel::Error,
                format!("waiting for unit '{}' failed: {e}", relay.unit()),
            );
            ExecutionOutcome::Failed { code: None }
        }
    }
}

async fn join_reader(reader: Option<JoinHandle<usize>>) -> usize {
    match reader {
        Some(handle) => handle.await.unwrap_or(0),
        None => 0,
    }
}
