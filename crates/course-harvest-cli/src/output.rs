//! Output mode shared by every command.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

static JSON: AtomicBool = AtomicBool::new(false);

pub fn set_json(enabled: bool) {
    JSON.store(enabled, Ordering::Relaxed);
}

/// Whether results go to stdout as JSON.
pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: cannot encode output: {e}"),
    }
}

/// Minutes as `H:MM`.
pub fn hours_minutes(minutes: f64) -> String {
    let total = minutes.round() as i64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Truncate to `width` characters, marking the cut.
pub fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
