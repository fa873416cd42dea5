// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `skillrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "skillrun",
    version,
    about = "Launch skill units as containers or local processes and collect their logs.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `SKILLRUN_CONFIG`, else `Skillrun.toml` in the current
    /// working directory. A missing file means built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SKILLRUN_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start a unit and wait until its output is fully drained.
    Run {
        /// Unit name (a directory under the skills tree).
        unit: String,

        /// Extra environment variable, `KEY=VALUE`. Repeatable; wins over
        /// configured values.
        #[arg(long = "env", short = 'e', value_name = "KEY=VALUE", value_parser = parse_key_val)]
        env: Vec<(String, String)>,

        /// Print the backend and assembled request without starting anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the most recent stored log lines.
    Logs {
        #[arg(long, default_value_t = 200)]
        limit: usize,

        /// One JSON object per line instead of plain text.
        #[arg(long)]
        json: bool,
    },

    /// Validate the config and report which backend would be used.
    Check,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
