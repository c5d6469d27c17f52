//! Duration text normalization.
//!
//! Converts the duration strings found on course pages ("1:30:45", "25:50",
//! "1시간 30분", "45 min", "12") into minutes rounded to two decimals.
//!
//! Forms are tried in a fixed order and the first one that matches wins:
//!
//! 1. `H:MM:SS` clock form
//! 2. `A:B` clock form, always read as minutes and seconds
//! 3. long form with an hour and/or minute marker
//! 4. bare integer, read as minutes
//!
//! A two-component clock is read as `MM:SS` in every context. Study-time
//! labels once used a "first part above 60" heuristic to pick between
//! `MM:SS` and `HH:MM`; that heuristic is not applied here.

use regex::Regex;
use std::sync::OnceLock;

/// Where a duration string came from. Declared totals must tell "unknown"
/// apart from "zero-length", so non-positive values are rejected there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationContext {
    /// A single lecture row in the curriculum sidebar.
    Lecture,
    /// Time already consumed, from the course header.
    StudyTime,
    /// Publisher-declared curriculum length, from the course header.
    Declared,
}

fn clock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+):(\d{1,2})(?::(\d{1,2}))?").expect("clock regex is valid")
    })
}

fn hour_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(?:시간|hours?|hrs?|h(?:[^a-z]|$))").expect("hour regex is valid")
    })
}

fn minute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(?:분|minutes?|mins?|m(?:[^a-z]|$))")
            .expect("minute regex is valid")
    })
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalize a duration string to minutes.
///
/// Returns `None` for empty or unrecognized input, and for non-positive
/// results in the [`DurationContext::Declared`] context.
pub fn normalize(text: &str, context: DurationContext) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let minutes = parse_clock(text)
        .or_else(|| parse_long_form(text))
        .or_else(|| text.parse::<u32>().ok().map(f64::from))?;
    let minutes = round2(minutes);

    if context == DurationContext::Declared && minutes <= 0.0 {
        return None;
    }
    Some(minutes)
}

/// Normalize, substituting zero for anything unrecognized.
pub fn minutes_or_zero(text: &str, context: DurationContext) -> f64 {
    normalize(text, context).unwrap_or(0.0)
}

fn parse_clock(text: &str) -> Option<f64> {
    let caps = clock_re().captures(text)?;
    let first: f64 = caps.get(1)?.as_str().parse().ok()?;
    let second: f64 = caps.get(2)?.as_str().parse().ok()?;

    match caps.get(3) {
        Some(third) => {
            let seconds: f64 = third.as_str().parse().ok()?;
            Some(first * 60.0 + second + round2(seconds / 60.0))
        }
        None => Some(first + round2(second / 60.0)),
    }
}

fn parse_long_form(text: &str) -> Option<f64> {
    let hours = hour_re()
        .captures(text)
        .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok());
    let minutes = minute_re()
        .captures(text)
        .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok());

    match (hours, minutes) {
        (None, None) => None,
        (h, m) => Some(h.unwrap_or(0.0) * 60.0 + m.unwrap_or(0.0)),
    }
}
