use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use skillrun::errors::{Result, SkillrunError};
use skillrun::exec::docker::{LogStream, RuntimeFuture};
use skillrun::exec::{ContainerRuntime, ContainerSpec};

/// A scripted container runtime that:
/// - records every spec it is asked to run
/// - answers pings (or fails them, when configured)
/// - replays a fixed list of log chunks for every container
#[derive(Debug, Default)]
pub struct FakeContainerRuntime {
    ping_error: Option<String>,
    start_error: Option<String>,
    log_chunks: Vec<String>,
    stream_error: Option<String>,
    specs: Arc<Mutex<Vec<ContainerSpec>>>,
    pings: AtomicUsize,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every ping fails with `BackendUnavailable(reason)`.
    pub fn failing_ping(mut self, reason: &str) -> Self {
        self.ping_error = Some(reason.to_string());
        self
    }

    /// Every `run_detached` fails with a start failure.
    pub fn failing_start(mut self, reason: &str) -> Self {
        self.start_error = Some(reason.to_string());
        self
    }

    /// Chunks served by `follow_logs`, in order.
    pub fn with_logs<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log_chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// End every log stream with an error after the scripted chunks.
    pub fn ending_with_error(mut self, reason: &str) -> Self {
        self.stream_error = Some(reason.to_string());
        self
    }

    /// Specs received so far.
    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

impl ContainerRuntime for FakeContainerRuntime {
    fn ping(&self) -> RuntimeFuture<'_, ()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let result = match &self.ping_error {
            Some(reason) => Err(SkillrunError::BackendUnavailable(reason.clone())),
            None => Ok(()),
        };
        Box::pin(async move { result })
    }

    fn run_detached(&self, spec: ContainerSpec) -> RuntimeFuture<'_, String> {
        Box::pin(async move {
            if let Some(reason) = &self.start_error {
                return Err(SkillrunError::start_failure(&spec.unit, reason));
            }
            let mut specs = self.specs.lock().unwrap();
            specs.push(spec);
            Ok(format!("fake-container-{}", specs.len()))
        })
    }

    fn follow_logs(&self, _container_id: &str) -> LogStream {
        let mut items: Vec<Result<String>> =
            self.log_chunks.iter().cloned().map(Ok).collect();
        if let Some(reason) = &self.stream_error {
            items.push(Err(SkillrunError::BackendUnavailable(reason.clone())));
        }
        futures::stream::iter(items).boxed()
    }
}
