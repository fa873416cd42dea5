#![allow(dead_code)]

pub use skillrun_test_utils::builders;
pub use skillrun_test_utils::fake_runtime::FakeContainerRuntime;
pub use skillrun_test_utils::{init_tracing, with_timeout, with_timeout_of};

use skillrun::env::EnvMap;
use skillrun::sink::{LogLevel, LogLine, LogSink};

/// This process's environment plus `extra`, so children still find `sh`.
pub fn ambient_with(extra: &[(&str, &str)]) -> EnvMap {
    let mut env = skillrun::env::ambient();
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    env
}

/// Stored lines tagged with `unit`, oldest first.
pub fn unit_lines(sink: &LogSink, unit: &str, limit: usize) -> Vec<LogLine> {
    sink.recent(limit)
        .into_iter()
        .filter(|l| l.is_from_unit(unit))
        .collect()
}

/// Texts of the lines at `level`, in order.
pub fn texts_at(lines: &[LogLine], level: LogLevel) -> Vec<String> {
    lines
        .iter()
        .filter(|l| l.level == level)
        .map(|l| l.text.clone())
        .collect()
}
