// src/logging.rs

//! Logging setup for `skillrun` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the console log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `SKILLRUN_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Console logs go to STDERR. Independently of the console level, host
//! events at INFO and above are also recorded in the [`LogSink`] through
//! [`SinkLayer`], so the sink holds unit output and service events side by
//! side.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use anyhow::Result;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt as tfmt;

use crate::cli;
use crate::relay::UNIT_OUTPUT_TARGET;
use crate::sink::{LogLevel, LogLine, LogSink};

/// Initialise the global subscriber: console layer plus [`SinkLayer`].
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<cli::LogLevel>, sink: Arc<LogSink>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("SKILLRUN_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(Level::INFO),
    };

    let console = tfmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::from_level(level));

    tracing_subscriber::registry()
        .with(console)
        .with(SinkLayer::new(sink).with_filter(LevelFilter::INFO))
        .try_init()?;

    Ok(())
}

/// Forwards tracing events into a [`LogSink`].
///
/// The event target becomes the line's component and a `unit` field, if
/// present, its unit tag. Events under [`UNIT_OUTPUT_TARGET`] are skipped;
/// the relay stores those itself. DEBUG and TRACE events are never stored.
#[derive(Debug, Clone)]
pub struct SinkLayer {
    sink: Arc<LogSink>,
}

impl SinkLayer {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() == UNIT_OUTPUT_TARGET {
            return;
        }

        let level = match *meta.level() {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warn,
            Level::INFO => LogLevel::Info,
            _ => return,
        };

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let mut line = LogLine::host(level, meta.target(), visitor.render());
        line.unit_name = visitor.unit;
        self.sink.emit(line);
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    unit: Option<String>,
    fields: String,
}

impl LineVisitor {
    fn render(&self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message.clone(),
            (true, false) => self.fields.clone(),
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "unit" => self.unit = Some(value.to_string()),
            name => self.push_field(name, format_args!("{value}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "unit" => self.unit = Some(format!("{value:?}")),
            name => self.push_field(name, format_args!("{value:?}")),
        }
    }
}

fn level_from_log_level(lvl: cli::LogLevel) -> Level {
    match lvl {
        cli::LogLevel::Error => Level::ERROR,
        cli::LogLevel::Warn => Level::WARN,
        cli::LogLevel::Info => Level::INFO,
        cli::LogLevel::Debug => Level::DEBUG,
        cli::LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
