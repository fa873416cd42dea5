// tests/container_backend.rs

mod common;
use crate::common::builders::{ConfigBuilder, SkillTree, memory_sink};
use crate::common::{FakeContainerRuntime, init_tracing, texts_at, unit_lines, with_timeout};

use std::error::Error;
use std::sync::Arc;

use skillrun::config::Config;
use skillrun::context::AppContext;
use skillrun::env::EnvMap;
use skillrun::errors::SkillrunError;
use skillrun::exec::{
    ContainerBackend, ContainerSettings, ExecutionBackend, ExecutionOutcome, ExecutionRequest,
};
use skillrun::sink::{LogLevel, LogSink};
use skillrun::types::{BackendKind, HostPlatform};

type TestResult = Result<(), Box<dyn Error>>;

struct Fixture {
    _tree: SkillTree,
    config: Config,
    runtime: Arc<FakeContainerRuntime>,
    sink: Arc<LogSink>,
}

impl Fixture {
    fn new(runtime: FakeContainerRuntime) -> Self {
        let tree = SkillTree::new().unit("daily-brief", "echo brief\n");
        let config = ConfigBuilder::new(&tree).use_mock(false).build();
        Self {
            _tree: tree,
            config,
            runtime: Arc::new(runtime),
            sink: memory_sink(100),
        }
    }

    fn backend(&self, platform: HostPlatform, ambient: EnvMap) -> ContainerBackend {
        let settings = ContainerSettings::from_config(&self.config).with_platform(platform);
        ContainerBackend::new(self.runtime.clone(), settings, ambient, self.sink.clone())
    }
}

fn request(pairs: &[(&str, &str)]) -> ExecutionRequest {
    let env = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ExecutionRequest::for_unit("daily-brief", env)
}

#[test]
fn loopback_url_is_rewritten_off_linux() -> TestResult {
    let fx = Fixture::new(FakeContainerRuntime::new());
    let backend = fx.backend(HostPlatform::Other, EnvMap::new());

    let spec = backend.container_spec(&request(&[("SIDECAR_URL", "http://127.0.0.1:12345")]))?;

    assert_eq!(spec.env["SIDECAR_URL"], "http://host.docker.internal:12345");
    assert_eq!(spec.extra_hosts, vec!["host.docker.internal:host-gateway"]);
    Ok(())
}

#[test]
fn linux_urls_and_hosts_are_left_alone() -> TestResult {
    let fx = Fixture::new(FakeContainerRuntime::new());
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let spec = backend.container_spec(&request(&[("SIDECAR_URL", "http://127.0.0.1:12345")]))?;

    assert_eq!(spec.env["SIDECAR_URL"], "http://127.0.0.1:12345");
    assert!(spec.extra_hosts.is_empty());
    Ok(())
}

#[test]
fn spec_mounts_skills_read_only_and_runs_entry() -> TestResult {
    let fx = Fixture::new(FakeContainerRuntime::new());
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let spec = backend.container_spec(&request(&[("SIDECAR_URL", "http://svc:1")]))?;

    assert_eq!(spec.image, "contex-brain:latest");
    assert_eq!(spec.cmd, vec!["sh", "/app/skills/daily-brief/main.sh"]);
    assert_eq!(spec.binds.len(), 1);
    assert!(spec.binds[0].ends_with(":/app/skills:ro"));
    assert!(spec.auto_remove);
    Ok(())
}

#[test]
fn ambient_secret_is_injected_over_request_value() -> TestResult {
    let fx = Fixture::new(FakeContainerRuntime::new());
    let ambient = EnvMap::from([("GOOGLE_API_KEY".to_string(), "from-host".to_string())]);
    let backend = fx.backend(HostPlatform::Linux, ambient);

    let spec = backend.container_spec(&request(&[
        ("SIDECAR_URL", "http://svc:1"),
        ("GOOGLE_API_KEY", "from-request"),
    ]))?;

    assert_eq!(spec.env["GOOGLE_API_KEY"], "from-host");
    Ok(())
}

#[test]
fn host_without_secret_keeps_request_value() -> TestResult {
    let fx = Fixture::new(FakeContainerRuntime::new());
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let spec = backend.container_spec(&request(&[
        ("SIDECAR_URL", "http://svc:1"),
        ("GOOGLE_API_KEY", "from-request"),
    ]))?;
    assert_eq!(spec.env["GOOGLE_API_KEY"], "from-request");

    let spec = backend.container_spec(&request(&[("SIDECAR_URL", "http://svc:1")]))?;
    assert!(!spec.env.contains_key("GOOGLE_API_KEY"));
    Ok(())
}

#[test]
fn missing_service_url_is_a_start_failure() {
    let fx = Fixture::new(FakeContainerRuntime::new());
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let err = backend.container_spec(&request(&[])).unwrap_err();

    assert!(matches!(err, SkillrunError::StartFailure { .. }));
    assert!(err.to_string().contains("SIDECAR_URL"));
}

#[test]
fn unknown_unit_is_not_found() {
    let fx = Fixture::new(FakeContainerRuntime::new());
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let req = ExecutionRequest::for_unit(
        "ghost",
        EnvMap::from([("SIDECAR_URL".to_string(), "http://svc:1".to_string())]),
    );
    assert!(matches!(
        backend.container_spec(&req),
        Err(SkillrunError::UnitNotFound(_))
    ));
}

#[tokio::test]
async fn container_logs_are_relayed_then_closed() -> TestResult {
    init_tracing();

    let fx = Fixture::new(FakeContainerRuntime::new().with_logs(["topic 1\ntopic 2\n", "done\n"]));
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let execution = backend
        .start(request(&[("SIDECAR_URL", "http://svc:1")]))
        .await?;
    assert_eq!(execution.id(), "fake-container-1");
    assert_eq!(execution.handle().backend_kind, BackendKind::Container);

    let outcome = with_timeout(execution.wait()).await;
    assert_eq!(outcome, ExecutionOutcome::LogStreamClosed);

    let lines = unit_lines(&fx.sink, "daily-brief", 100);
    assert_eq!(
        texts_at(&lines, LogLevel::Info),
        vec!["topic 1", "topic 2", "done", "container log stream closed"]
    );
    assert_eq!(fx.runtime.specs().len(), 1);
    Ok(())
}

#[tokio::test]
async fn lines_split_across_log_frames_are_joined() -> TestResult {
    init_tracing();

    let fx = Fixture::new(FakeContainerRuntime::new().with_logs(["topic 1 hel", "lo world\n"]));
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let execution = backend
        .start(request(&[("SIDECAR_URL", "http://svc:1")]))
        .await?;
    with_timeout(execution.wait()).await;

    let lines = unit_lines(&fx.sink, "daily-brief", 100);
    assert_eq!(
        texts_at(&lines, LogLevel::Info),
        vec!["topic 1 hello world", "container log stream closed"]
    );
    Ok(())
}

#[tokio::test]
async fn broken_log_stream_is_logged_as_error() -> TestResult {
    init_tracing();

    let fx = Fixture::new(
        FakeContainerRuntime::new()
            .with_logs(["partial\n"])
            .ending_with_error("daemon went away"),
    );
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let execution = backend
        .start(request(&[("SIDECAR_URL", "http://svc:1")]))
        .await?;
    let outcome = with_timeout(execution.wait()).await;

    assert_eq!(outcome, ExecutionOutcome::LogStreamInterrupted);
    let errors = texts_at(&unit_lines(&fx.sink, "daily-brief", 100), LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("container log stream ended abnormally"));
    assert!(errors[0].contains("daemon went away"));
    Ok(())
}

#[tokio::test]
async fn create_failure_is_surfaced_to_the_caller() {
    init_tracing();

    let fx = Fixture::new(FakeContainerRuntime::new().failing_start("no such image"));
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());

    let err = backend
        .start(request(&[("SIDECAR_URL", "http://svc:1")]))
        .await
        .unwrap_err();

    assert!(matches!(err, SkillrunError::StartFailure { .. }));
    assert_eq!(err.status_code(), 500);
    assert!(fx.sink.recent(10).is_empty());
}

#[tokio::test]
async fn triggered_container_gets_the_dry_run_environment() -> TestResult {
    init_tracing();

    let fx = Fixture::new(FakeContainerRuntime::new());
    let backend = fx.backend(HostPlatform::Linux, EnvMap::new());
    let ctx = AppContext::with_backend(fx.config.clone(), fx.sink.clone(), backend.into());
    let overrides = EnvMap::from([("TOPIC_COUNT".to_string(), "3".to_string())]);

    let expected = ctx.request_for("daily-brief", &overrides);
    let execution = ctx.trigger("daily-brief", &overrides).await?;
    with_timeout(execution.wait()).await;

    let specs = fx.runtime.specs();
    assert_eq!(specs.len(), 1);
    assert_eq!(&specs[0].env, expected.environment());
    assert_eq!(specs[0].env["TOPIC_COUNT"], "3");
    Ok(())
}
