//! `course-harvest courses`: list stored courses.

use anyhow::Result;
use std::path::Path;

use course_harvest::CourseFilter;

use super::open_store;
use crate::output;

pub fn run(db: &Path) -> Result<()> {
    let store = open_store(db)?;
    let courses = store.select_courses(&CourseFilter::default())?;

    let mut rows = Vec::with_capacity(courses.len());
    for course in courses {
        let lectures = store.lectures_for(course.id)?;
        let completed = lectures.iter().filter(|l| l.is_completed).count();
        rows.push((course, lectures.len(), completed));
    }

    if output::is_json() {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|(c, lectures, completed)| {
                serde_json::json!({
                    "course": c,
                    "lectures": lectures,
                    "completed_lectures": completed,
                })
            })
            .collect();
        output::print_json(&serde_json::json!({
            "total": items.len(),
            "courses": items,
        }));
        return Ok(());
    }

    if rows.is_empty() {
        eprintln!("  No courses stored. Run 'course-harvest discover' first.");
        return Ok(());
    }

    println!(
        "  {:<8} {:>6} {:>7} {:>9}  {}",
        "ID", "DONE", "TOTAL", "LECTURES", "TITLE"
    );
    for (c, lectures, completed) in &rows {
        let marker = if c.is_target { "*" } else { " " };
        println!(
            "{marker} {:<8} {:>5.1}% {:>7} {:>4}/{:<4}  {}",
            c.id,
            c.progress_percent,
            output::hours_minutes(c.total_minutes),
            completed,
            lectures,
            output::clip(&c.title, 50),
        );
    }
    Ok(())
}
