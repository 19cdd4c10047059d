// File logging; the terminal belongs to the UI

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::Path;

pub fn init(log_path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .context("Logger already initialized")?;

    Ok(())
}
