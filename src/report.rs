//! Terminal output.
//!
//! Progress and diagnostics go to stderr so stdout only carries the final summary line. Colors
//! follow `owo-colors`' stream detection, which also honours `NO_COLOR`.

use std::fmt::Display;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream::Stderr};

pub fn step(msg: impl Display) {
    eprintln!("{} {msg}", "::".if_supports_color(Stderr, |t| t.blue()));
}

pub fn info(msg: impl Display) {
    eprintln!("   {msg}");
}

pub fn warn(msg: impl Display) {
    eprintln!("{} {msg}", "warning:".if_supports_color(Stderr, |t| t.yellow()));
}

/// A single record was dropped.
pub fn skip(what: impl Display, reason: impl Display) {
    eprintln!(
        "{} {what}: {reason}",
        "skipping".if_supports_color(Stderr, |t| t.dimmed())
    );
}

pub fn error(msg: impl Display) {
    eprintln!("{} {msg}", "error:".if_supports_color(Stderr, |t| t.red()));
}

/// Per-source tally, `✓ <fetched> ✗ <skipped>` like the bibliography fetcher's summary.
pub fn tally(label: impl Display, ok: usize, failed: usize) {
    eprintln!(
        "   {label}: {} {ok} {} {failed}",
        "✓".if_supports_color(Stderr, |t| t.green()),
        "✗".if_supports_color(Stderr, |t| t.red()),
    );
}

/// Progress bar for a known number of sequential requests. Hidden when stderr is not a
/// terminal.
pub fn progress(len: usize, prefix: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {wide_msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_prefix(prefix);
    bar
}
