//! Startup banner and end-of-run summary.

use std::path::Path;

use crate::batch::BatchSummary;
use crate::consts::{AUTHOR, format_duration, format_number};

/// Run configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub config: &'a Path,
    pub output: &'a Path,
    pub backend: &'a str,
    pub interviewer: &'a str,
    pub technician: &'a str,
    pub timeout_secs: u64,
    pub max_rounds: usize,
    pub combinations: usize,
}

pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   debrief {}  ·  {}

   config        {}
   output        {}
   backend       {}
   interviewer   {}
   technician    {}
   timeout       {}s per call
   rounds        up to {}
   combinations  {}
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        info.config.display(),
        info.output.display(),
        info.backend,
        info.interviewer,
        info.technician,
        info.timeout_secs,
        info.max_rounds,
        info.combinations,
    );
}

/// Print totals, failures and token usage.
pub fn print_summary(summary: &BatchSummary) {
    println!(
        "\n{} of {} conversation(s) written in {}.",
        summary.completed.len(),
        summary.total(),
        format_duration(summary.elapsed)
    );
    if !summary.failed.is_empty() {
        println!("{} failed:", summary.failed.len());
        for failure in &summary.failed {
            println!("  {}: {}", failure.label, failure.error);
        }
    }
    let usage = summary.usage;
    if usage.total() > 0 {
        println!(
            "tokens: {:>6} input + {:>6} output = {:>6}",
            format_number(usage.input_tokens),
            format_number(usage.output_tokens),
            format_number(usage.total()),
        );
    }
}
