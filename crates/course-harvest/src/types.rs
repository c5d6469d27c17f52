//! Core data types for course harvesting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::DriverError;

/// One enrolled course with its aggregate progress metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Stable identifier taken from the course URL.
    pub id: i64,
    pub title: String,
    /// 0–100, 0 when the page shows no progress value.
    pub progress_percent: f64,
    /// Time actually consumed, in minutes.
    pub study_minutes: f64,
    /// Publisher-declared curriculum length, in minutes.
    pub total_minutes: f64,
    pub url: String,
    /// Rank assigned by discovery, if the course was discovered.
    pub display_order: Option<i64>,
    /// User-maintained flag, never written by a harvest.
    pub is_target: bool,
    /// Set by the store on every upsert.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Course {
    /// A course with only the identity fields known.
    pub fn placeholder(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            title: placeholder_title(id),
            progress_percent: 0.0,
            study_minutes: 0.0,
            total_minutes: 0.0,
            url: url.into(),
            display_order: None,
            is_target: false,
            updated_at: None,
        }
    }
}

/// Title used when nothing better could be read from the page.
pub fn placeholder_title(id: i64) -> String {
    format!("Course {id}")
}

/// A lecture as produced by extraction, before it is numbered by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLecture {
    pub section_number: i64,
    pub section_title: String,
    pub lecture_number: i64,
    pub lecture_title: String,
    pub lecture_minutes: f64,
    pub is_completed: bool,
}

/// A persisted lecture row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub course_id: i64,
    pub section_number: i64,
    pub section_title: String,
    pub lecture_number: i64,
    pub lecture_title: String,
    pub lecture_minutes: f64,
    pub is_completed: bool,
    /// 1-based, section-major then lecture-minor.
    pub sort_order: i64,
}

/// Reference to a course page, as returned by discovery and drift detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRef {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub display_order: Option<i64>,
}

/// A curriculum section read from the classroom sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Completed/total as printed in the section header.
    pub completed_count: Option<u32>,
    pub total_count: Option<u32>,
    pub lessons: Vec<Lesson>,
}

/// One lecture entry inside a section, with its duration still raw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub title: String,
    pub duration_text: String,
    pub is_completed: bool,
}

/// Outcome of a single harvest attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Success,
    Failure,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStatus::Success => "success",
            CrawlStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(CrawlStatus::Success),
            "failure" => Some(CrawlStatus::Failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit row for one harvest attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlLogEntry {
    pub id: i64,
    pub course_id: i64,
    pub status: CrawlStatus,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Per-course result returned to the caller of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutcome {
    pub course_id: i64,
    pub status: CrawlStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CourseOutcome {
    pub fn success(course_id: i64) -> Self {
        Self {
            course_id,
            status: CrawlStatus::Success,
            error_message: None,
        }
    }

    pub fn failure(course_id: i64, message: impl Into<String>) -> Self {
        Self {
            course_id,
            status: CrawlStatus::Failure,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CrawlStatus::Success
    }
}

/// Success/failure tally over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<CourseOutcome>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: Vec<CourseOutcome>) -> Self {
        let succeeded = outcomes
            .iter()
            .filter(|o| o.is_success())
            .count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        }
    }
}

/// A course whose captured lectures disagree with its declared length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub course: CourseRef,
    pub total_minutes: f64,
    pub lecture_minutes: f64,
    pub difference: f64,
}

/// Errors that can occur in course harvesting.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("All strategies exhausted for {0}")]
    FallbackExhausted(String),

    #[error("Session expired while loading {0}")]
    SessionExpired(String),

    #[error("No course id in URL: {0}")]
    InvalidCourseUrl(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;
