//! `course-harvest target`: flag a course for target-only runs.

use anyhow::{bail, Result};
use std::path::Path;

use super::open_store;
use crate::output;

pub fn run(db: &Path, course_id: i64, unset: bool) -> Result<()> {
    let store = open_store(db)?;
    if !store.set_target(course_id, !unset)? {
        bail!("No stored course {course_id}. Run 'course-harvest discover' first.");
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "course_id": course_id,
            "is_target": !unset,
        }));
    } else if unset {
        println!("  Course {course_id} is no longer a target.");
    } else {
        println!("  Course {course_id} marked as a target.");
    }
    Ok(())
}
