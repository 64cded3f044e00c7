//! Project-wide constants.

use std::time::Duration;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Rounds (technician reply + interviewer reply) after the opening greeting.
pub const DEFAULT_MAX_ROUNDS: usize = 15;

/// An interviewer reply containing any of these (case-insensitive) ends the conversation.
pub const STOP_PHRASES: &[&str] = &["goodbye", "concludes my report"];

/// Per-call model timeout when `GEMINI_API_TIMEOUT` is unset.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_OUTPUT_DIR: &str = "conversation_logs";

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const API_BASE_VAR: &str = "GEMINI_API_BASE";
pub const TIMEOUT_VAR: &str = "GEMINI_API_TIMEOUT";
pub const DRY_RUN_VAR: &str = "LLM_CONVERSATION_DRY_RUN";
pub const LOG_LEVEL_VAR: &str = "LLM_CONVERSATION_LOG_LEVEL";
pub const LOG_FILE_VAR: &str = "LLM_CONVERSATION_LOG_FILE";

/// Format a number with comma separators (e.g. 1,234,567).
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Compact human duration: `9s`, `4m12s`, `1h02m03s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}
