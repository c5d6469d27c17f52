//! Course page metadata: id, title and the header progress values.

use regex::Regex;
use tracing::debug;

use crate::config::{PageLabels, SiteProfile};
use crate::driver::PageDriver;
use crate::duration::{minutes_or_zero, DurationContext};
use crate::types::{placeholder_title, HarvestResult};

/// Values read from a classroom page header.
#[derive(Debug, Clone, PartialEq)]
pub struct CoursePage {
    pub title: String,
    pub progress_percent: f64,
    pub study_minutes: f64,
    pub total_minutes: f64,
}

/// Course id from a classroom URL: the segment after `marker`, or the last
/// path segment. Only all-digit ids are accepted.
pub fn course_id_from_url(url: &str, marker: &str) -> Option<i64> {
    let parsed = url::Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();

    let candidate = segments
        .iter()
        .position(|s| *s == marker)
        .and_then(|i| segments.get(i + 1))
        .or_else(|| segments.last())?;

    if candidate.is_empty() || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    candidate.parse().ok()
}

/// Course title from the document title: the part after the first " - ",
/// else the part before the first "|".
pub fn title_from_document(document_title: &str) -> Option<String> {
    let candidate = if let Some((_, rest)) = document_title.split_once(" - ") {
        rest
    } else if let Some((head, _)) = document_title.split_once('|') {
        head
    } else {
        return None;
    };
    let candidate = candidate.trim();
    (!candidate.is_empty() && candidate != document_title.trim()).then(|| candidate.to_string())
}

/// Pick the course title from the document title and page heading.
///
/// A document-title candidate shorter than 10 characters gives way to a
/// heading longer than 10; anything still shorter than 5 becomes the
/// placeholder.
pub fn choose_title(course_id: i64, document_title: &str, heading: Option<&str>) -> String {
    let mut title = title_from_document(document_title);

    let too_short = title.as_ref().map_or(true, |t| t.chars().count() < 10);
    if too_short {
        if let Some(h) = heading.map(str::trim).filter(|h| h.chars().count() > 10) {
            title = Some(h.to_string());
        }
    }

    match title {
        Some(t) if t.chars().count() >= 5 => t,
        _ => placeholder_title(course_id),
    }
}

/// Label patterns for the header text, compiled once per profile.
pub struct HeaderPatterns {
    progress: Regex,
    study: Regex,
    total: Regex,
}

impl HeaderPatterns {
    pub fn new(labels: &PageLabels) -> HarvestResult<Self> {
        let compile = |pattern: String| {
            Regex::new(&pattern)
                .map_err(|e| crate::types::HarvestError::Config(format!("label pattern: {e}")))
        };
        Ok(Self {
            progress: compile(format!(
                r"{}\s*(\d+(?:\.\d+)?)\s*%",
                regex::escape(&labels.progress)
            ))?,
            study: compile(format!(
                r"{}\s*(\d+:\d{{1,2}}(?::\d{{1,2}})?)",
                regex::escape(&labels.study_time)
            ))?,
            total: compile(format!(
                r"{}\s*(\d+:\d{{1,2}}:\d{{1,2}})",
                regex::escape(&labels.total_time)
            ))?,
        })
    }

    /// Progress, study minutes and declared total minutes from body text.
    /// Missing values are zero.
    pub fn parse(&self, body: &str) -> (f64, f64, f64) {
        let capture = |re: &Regex| {
            re.captures(body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let progress = capture(&self.progress)
            .and_then(|p| p.parse::<f64>().ok())
            .map(|p| p.clamp(0.0, 100.0))
            .unwrap_or(0.0);
        let study = capture(&self.study)
            .map(|s| minutes_or_zero(&s, DurationContext::StudyTime))
            .unwrap_or(0.0);
        let total = capture(&self.total)
            .map(|s| minutes_or_zero(&s, DurationContext::Declared))
            .unwrap_or(0.0);
        (progress, study, total)
    }
}

/// Read title and header values from the current page.
pub async fn read_course_page(
    page: &dyn PageDriver,
    course_id: i64,
    profile: &SiteProfile,
) -> HarvestResult<CoursePage> {
    let document_title = page.title().await?;
    let heading = match page.query(None, &profile.curriculum.heading).await? {
        Some(h) => Some(page.inner_text(Some(&h)).await?),
        None => None,
    };
    let title = choose_title(course_id, &document_title, heading.as_deref());

    let body = page.inner_text(None).await?;
    let (progress_percent, study_minutes, total_minutes) =
        HeaderPatterns::new(&profile.labels)?.parse(&body);

    debug!(
        course_id,
        title = %title,
        progress_percent,
        study_minutes,
        total_minutes,
        "course header read"
    );

    Ok(CoursePage {
        title,
        progress_percent,
        study_minutes,
        total_minutes,
    })
}
