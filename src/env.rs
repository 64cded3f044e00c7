//! Process environment: `.env` discovery and the knobs read from it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::consts::{DEFAULT_TIMEOUT_SECS, DRY_RUN_VAR, TIMEOUT_VAR};

/// Load the nearest `.env` walking up from `start`. Variables already set in
/// the process win. Returns the file that was loaded, if any.
///
/// Runs before logging is initialised, so problems go to stderr.
pub fn load_dotenv_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(".env");
        if candidate.is_file() {
            return match dotenvy::from_path(&candidate) {
                Ok(()) => Some(candidate),
                Err(e) => {
                    eprintln!("warning: failed to load {}: {}", candidate.display(), e);
                    None
                }
            };
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn load_dotenv() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    load_dotenv_from(&cwd)
}

/// `1` or `true` (any case) enables dry-run.
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true")
}

pub fn dry_run_from_env() -> bool {
    std::env::var(DRY_RUN_VAR)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

/// Parse a timeout in whole seconds. A trailing `# comment` is ignored.
pub fn parse_timeout(raw: &str) -> Result<Duration> {
    let value = raw.split('#').next().unwrap_or("").trim();
    let secs: u64 = value.parse().with_context(|| {
        format!("{} must be a whole number of seconds, got {:?}", TIMEOUT_VAR, raw)
    })?;
    Ok(Duration::from_secs(secs))
}

/// Per-call model timeout from `GEMINI_API_TIMEOUT`, 60s when unset.
pub fn api_timeout() -> Result<Duration> {
    match std::env::var(TIMEOUT_VAR) {
        Ok(raw) => parse_timeout(&raw),
        Err(_) => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
    }
}
