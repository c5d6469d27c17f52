//! `course-harvest drift`: courses whose lectures miss the declared total.

use anyhow::Result;
use std::path::Path;

use super::open_store;
use crate::output;

pub fn run(db: &Path, threshold: f64) -> Result<()> {
    let store = open_store(db)?;
    let report = store.drift_report(threshold)?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "threshold": threshold,
            "total": report.len(),
            "courses": report,
        }));
        return Ok(());
    }

    if report.is_empty() {
        eprintln!("  No course drifts more than {:.0}%.", threshold * 100.0);
        return Ok(());
    }

    println!("  {:<8} {:>9} {:>9} {:>7}  TITLE", "ID", "DECLARED", "CAPTURED", "DIFF");
    for d in &report {
        println!(
            "  {:<8} {:>9} {:>9} {:>6.1}%  {}",
            d.course.id,
            output::hours_minutes(d.total_minutes),
            output::hours_minutes(d.lecture_minutes),
            d.difference / d.total_minutes * 100.0,
            output::clip(d.course.title.as_deref().unwrap_or("-"), 50),
        );
    }
    Ok(())
}
