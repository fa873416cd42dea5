// src/main.rs

use std::sync::Arc;

use skillrun::config::{default_config_path, load_and_validate};
use skillrun::sink::LogSink;
use skillrun::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("skillrun error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = load_and_validate(&config_path)?;

    let sink = Arc::new(LogSink::new(&config.log));
    logging::init_logging(args.log_level, Arc::clone(&sink))?;

    run(args, config, sink).await
}
