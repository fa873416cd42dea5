// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod env;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod relay;
pub mod sink;
pub mod types;

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::Config;
use crate::context::AppContext;
use crate::env::EnvMap;
use crate::exec::ExecutionRequest;
use crate::sink::{LogLine, LogSink};

/// Placeholder printed instead of secret values.
const REDACTED: &str = "<redacted>";

/// High-level entry point used by `main.rs`.
///
/// `config` is already loaded and validated and `sink` is the one shared
/// log sink of the process (logging is initialised around it).
pub async fn run(args: CliArgs, config: Config, sink: Arc<LogSink>) -> Result<()> {
    match args.command {
        Command::Run {
            unit,
            env,
            dry_run,
        } => {
            let overrides: EnvMap = env.into_iter().collect();
            let ctx = AppContext::initialise(config, sink).await;

            if dry_run {
                print_dry_run(&ctx, &ctx.request_for(&unit, &overrides))?;
                return Ok(());
            }

            let execution = ctx
                .trigger(&unit, &overrides)
                .await
                .with_context(|| format!("starting unit '{unit}'"))?;
            println!("{}", serde_json::to_string(&execution.response())?);

            let outcome = execution.wait().await;
            debug!(unit = %unit, ?outcome, "unit supervisor finished");
            if !outcome.is_success() {
                bail!("unit '{unit}' did not finish successfully ({outcome:?})");
            }
            Ok(())
        }

        Command::Logs { limit, json } => {
            for line in sink.query(limit) {
                if json {
                    println!("{}", serde_json::to_string(&line)?);
                } else {
                    println!("{}", render_line(&line));
                }
            }
            Ok(())
        }

        Command::Check => {
            let ctx = AppContext::initialise(config, sink).await;
            let cfg = ctx.config();
            println!("skillrun check");
            println!("  backend            = {}", ctx.backend_kind());
            println!("  backend.use_mock   = {}", cfg.backend.use_mock);
            println!("  backend.image      = {}", cfg.backend.image);
            println!("  backend.skills_dir = {}", cfg.backend.skills_dir.display());
            println!("  backend.max_concurrent = {}", cfg.backend.max_concurrent);
            println!("  service.{} = {}", cfg.service.url_key, cfg.service.url);
            match ctx.sink().file_path() {
                Some(path) => println!("  log.file           = {}", path.display()),
                None => println!("  log.file           = (memory only)"),
            }
            println!("  units configured   = {}", cfg.units.len());
            for name in cfg.units.keys() {
                println!("    - {name}");
            }
            Ok(())
        }
    }
}

/// Print the backend and the request a real run would start.
fn print_dry_run(ctx: &AppContext, request: &ExecutionRequest) -> Result<()> {
    let secrets = &ctx.config().secrets;
    let environment: EnvMap = request
        .environment()
        .iter()
        .map(|(key, value)| {
            let secret = key == &secrets.container_key || secrets.values.contains_key(key);
            let shown = if secret { REDACTED.to_string() } else { value.clone() };
            (key.clone(), shown)
        })
        .collect();

    let report = serde_json::json!({
        "backend": ctx.backend_kind(),
        "unit": request.unit_name(),
        "command_ref": request.command_ref(),
        "environment": environment,
    });
    println!("skillrun dry-run");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Plain-text rendering for `skillrun logs`.
fn render_line(line: &LogLine) -> String {
    let ts = line.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ");
    match &line.unit_name {
        Some(unit) => format!("{ts} {:<5} [{}] {unit}: {}", line.level, line.component, line.text),
        None => format!("{ts} {:<5} [{}] {}", line.level, line.component, line.text),
    }
}
