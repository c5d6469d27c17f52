//! Reconciliation: turns harvest results into store writes and outcomes.
//!
//! Nothing here returns an error for a single course. A failed write is
//! rolled back, logged, and recorded as a failure row; every attempt ends
//! with exactly one crawl-log row.

use tracing::{error, info, warn};

use crate::store::CourseStore;
use crate::types::{
    Course, CourseOutcome, CourseRef, CrawlStatus, DriftReport, HarvestResult, NewLecture,
};

/// Default drift tolerance: 10% of the declared total.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.10;

pub struct Reconciler<'a> {
    store: &'a CourseStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a CourseStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CourseStore {
        self.store
    }

    /// Upsert course metadata alone.
    pub fn upsert_course(&self, course: &Course) -> CourseOutcome {
        match self.store.upsert_course(course) {
            Ok(()) => CourseOutcome::success(course.id),
            Err(e) => {
                warn!(course_id = course.id, error = %e, "course write rolled back");
                CourseOutcome::failure(course.id, format!("store write failed: {e}"))
            }
        }
    }

    /// Replace a course's lectures atomically.
    pub fn replace_lectures(&self, course_id: i64, lectures: &[NewLecture]) -> HarvestResult<usize> {
        self.store.replace_lectures(course_id, lectures)
    }

    /// Append the crawl-log row for `outcome`. A failure to write the log
    /// itself is reported through tracing.
    pub fn record_attempt(&self, outcome: &CourseOutcome) {
        if let Err(e) = self.store.record_attempt(
            outcome.course_id,
            outcome.status,
            outcome.error_message.as_deref(),
        ) {
            error!(course_id = outcome.course_id, error = %e, "crawl log write failed");
        }
    }

    /// Persist a complete harvest: course and lectures in one transaction,
    /// then the attempt row.
    pub fn persist_harvest(&self, course: &Course, lectures: &[NewLecture]) -> CourseOutcome {
        let outcome = match self.store.write_harvest(course, Some(lectures)) {
            Ok(()) => {
                info!(course_id = course.id, lectures = lectures.len(), "course saved");
                CourseOutcome::success(course.id)
            }
            Err(e) => {
                warn!(course_id = course.id, error = %e, "course write rolled back");
                CourseOutcome::failure(course.id, format!("store write failed: {e}"))
            }
        };
        self.record_attempt(&outcome);
        outcome
    }

    /// Persist course metadata when no lectures could be read. The existing
    /// lectures are left untouched and the attempt counts as a failure.
    pub fn persist_partial(&self, course: &Course, reason: &str) -> CourseOutcome {
        let outcome = match self.upsert_course(course) {
            CourseOutcome {
                status: CrawlStatus::Success,
                ..
            } => CourseOutcome::failure(course.id, reason),
            failed => failed,
        };
        self.record_attempt(&outcome);
        outcome
    }

    /// Record a course that produced nothing to persist.
    pub fn record_failure(&self, course_id: i64, message: impl Into<String>) -> CourseOutcome {
        let outcome = CourseOutcome::failure(course_id, message);
        self.record_attempt(&outcome);
        outcome
    }

    /// Courses whose captured lectures miss their declared total by more
    /// than `threshold_ratio`, largest drift first.
    pub fn find_drifted_courses(&self, threshold_ratio: f64) -> HarvestResult<Vec<CourseRef>> {
        Ok(self
            .drift_report(threshold_ratio)?
            .into_iter()
            .map(|d| d.course)
            .collect())
    }

    pub fn drift_report(&self, threshold_ratio: f64) -> HarvestResult<Vec<DriftReport>> {
        self.store.drift_report(threshold_ratio)
    }

    /// Clear the lectures of every drifted course in one batch before they
    /// are harvested again.
    pub fn selective_recrawl(&self, drifted: &[CourseRef]) -> HarvestResult<usize> {
        let ids: Vec<i64> = drifted.iter().map(|c| c.id).collect();
        let deleted = self.store.delete_lectures_for(&ids)?;
        info!(courses = ids.len(), lectures = deleted, "lectures cleared for recrawl");
        Ok(deleted)
    }
}
