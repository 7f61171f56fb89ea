use anyhow::Context;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const DEFAULT_DIRECTIVES: &str = "info";

/// Console logging to stderr, filtered by `RUST_LOG` (default `info`), plus
/// an optional plain-text copy appended to `log_file`.
pub fn init(log_file: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter(std::env::var("RUST_LOG").ok().as_deref(), verbose)?);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).context("create log directory")?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(env_filter(None, verbose)?),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

pub(crate) fn env_filter(directives: Option<&str>, verbose: bool) -> anyhow::Result<EnvFilter> {
    let directives = match directives.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.to_string(),
        None if verbose => "debug".to_string(),
        None => DEFAULT_DIRECTIVES.to_string(),
    };
    EnvFilter::try_new(&directives).with_context(|| format!("invalid log filter {directives:?}"))
}
