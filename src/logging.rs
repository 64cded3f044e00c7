//! Diagnostic logging, configured from the environment.
//!
//! - `LLM_CONVERSATION_LOG_LEVEL`: `trace`, `debug`, `info`, `warn`/`warning`,
//!   `error`/`critical`. Unset means no diagnostic output at all.
//! - `LLM_CONVERSATION_LOG_FILE`: also append plain-text logs to this file.
//!
//! Only this crate's targets are enabled, so HTTP client internals stay quiet.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::consts::{LOG_FILE_VAR, LOG_LEVEL_VAR};

const TARGET: &str = "debrief";

pub fn parse_level(raw: &str) -> Option<LevelFilter> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" | "notset" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" | "critical" | "fatal" => Some(LevelFilter::ERROR),
        _ => None,
    }
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if path.is_dir() {
        bail!("log file path {} is a directory, not a file", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

/// Install the global subscriber. Returns `false` when logging stays off.
pub fn init() -> Result<bool> {
    let Some(raw) = std::env::var(LOG_LEVEL_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
    else {
        return Ok(false);
    };

    let Some(level) = parse_level(&raw) else {
        eprintln!("Invalid log level: {}. Logging will be disabled.", raw);
        return Ok(false);
    };

    let file = match std::env::var(LOG_FILE_VAR) {
        Ok(path) if !path.trim().is_empty() => Some(open_log_file(Path::new(&path))?),
        _ => None,
    };

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let file_layer = file.map(|f| fmt::layer().with_writer(Mutex::new(f)).with_ansi(false));

    tracing_subscriber::registry()
        .with(Targets::new().with_target(TARGET, level))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(true)
}
