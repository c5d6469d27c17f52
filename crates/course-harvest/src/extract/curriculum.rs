//! Curriculum extraction from the classroom sidebar.
//!
//! Chapters are collapsible accordion nodes whose clips are only present
//! once expanded. Expansion runs a bounded number of passes: each pass
//! re-enumerates headers, so a node revealed by opening its parent in pass
//! N is opened in pass N+1. Nodes nested deeper than the pass count stay
//! closed; the last pass logs when it still had work to do.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{CurriculumSelectors, HarvestConfig, Timings};
use crate::driver::{ElementRef, PageDriver};
use crate::duration::{minutes_or_zero, DurationContext};
use crate::session::AuthenticatedSession;
use crate::strategy::retry;
use crate::types::{HarvestResult, Lesson, NewLecture, Section};

/// Counters from accordion expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    pub passes: u32,
    pub opened: usize,
    pub already_open: usize,
    pub failed: usize,
    /// Nodes opened during the final pass.
    pub opened_last_pass: usize,
}

/// Open `course_url` on its own page and read its curriculum.
pub async fn extract_curriculum(
    session: &AuthenticatedSession,
    course_url: &str,
    config: &HarvestConfig,
) -> HarvestResult<Vec<Section>> {
    let page = session.open_page().await?;
    let result = async {
        page.navigate(course_url, config.timings.navigation_timeout)
            .await?;
        read_curriculum(&*page, config).await
    }
    .await;
    page.release().await;
    result
}

/// Read the curriculum of the course page currently loaded in `page`.
///
/// Returns an empty list when the sidebar never appears.
pub async fn read_curriculum(
    page: &dyn PageDriver,
    config: &HarvestConfig,
) -> HarvestResult<Vec<Section>> {
    let selectors = &config.profile.curriculum;
    let timings = &config.timings;

    if page
        .wait_for_selector(&selectors.container, timings.curriculum_wait)
        .await?
        .is_none()
    {
        warn!(
            selector = %selectors.container,
            wait_secs = timings.curriculum_wait.as_secs(),
            "curriculum container not found"
        );
        return Ok(Vec::new());
    }
    page.wait_for_timeout(timings.curriculum_settle).await;

    let stats = expand_accordions(page, selectors, timings).await?;
    debug!(?stats, "accordion expansion finished");
    page.wait_for_timeout(timings.accordion_final_settle).await;

    read_sections(page, selectors).await
}

/// Expand collapsed accordion nodes in up to `timings.accordion_passes` passes.
pub async fn expand_accordions(
    page: &dyn PageDriver,
    selectors: &CurriculumSelectors,
    timings: &Timings,
) -> HarvestResult<ExpansionStats> {
    let mut stats = ExpansionStats::default();
    for pass in 0..timings.accordion_passes {
        if pass > 0 {
            page.wait_for_timeout(timings.accordion_pass_settle).await;
        }
        let opened = expansion_pass(page, selectors, timings, &mut stats).await?;
        stats.passes = pass + 1;
        stats.opened_last_pass = opened;
        debug!(pass = pass + 1, opened, "expansion pass");
    }

    if stats.opened_last_pass > 0 {
        warn!(
            passes = stats.passes,
            opened = stats.opened_last_pass,
            "final expansion pass still opened nodes; deeper levels may remain closed"
        );
    }
    Ok(stats)
}

async fn expansion_pass(
    page: &dyn PageDriver,
    selectors: &CurriculumSelectors,
    timings: &Timings,
    stats: &mut ExpansionStats,
) -> HarvestResult<usize> {
    let headers = page.query_all(None, &selectors.accordion_header).await?;
    let mut opened = 0;

    for (index, header) in headers.iter().enumerate() {
        if page
            .query(Some(header), &selectors.accordion_arrow)
            .await?
            .is_none()
        {
            continue;
        }
        let Some(node) = page.closest(header, &selectors.accordion_node).await? else {
            debug!(index, "header without accordion node");
            continue;
        };
        if is_open(page, &node, &selectors.open_class).await? {
            stats.already_open += 1;
            continue;
        }

        let expanded = retry(2, Duration::ZERO, |_| {
            open_node(page, header, &node, &selectors.open_class, timings)
        })
        .await;

        if expanded {
            opened += 1;
            stats.opened += 1;
        } else {
            stats.failed += 1;
            warn!(index, "accordion node did not open; skipped");
        }
    }
    Ok(opened)
}

async fn open_node(
    page: &dyn PageDriver,
    header: &ElementRef,
    node: &ElementRef,
    open_class: &str,
    timings: &Timings,
) -> bool {
    if let Err(e) = page.scroll_into_view(header).await {
        debug!(error = %e, "scroll into view failed");
    }
    page.wait_for_timeout(timings.accordion_scroll_settle).await;
    if let Err(e) = page.click(header).await {
        debug!(error = %e, "header click failed");
        return false;
    }
    page.wait_for_timeout(timings.accordion_settle).await;
    is_open(page, node, open_class).await.unwrap_or(false)
}

async fn is_open(page: &dyn PageDriver, node: &ElementRef, open_class: &str) -> HarvestResult<bool> {
    has_class(page, node, open_class).await
}

async fn has_class(page: &dyn PageDriver, element: &ElementRef, class: &str) -> HarvestResult<bool> {
    Ok(page
        .attribute(element, "class")
        .await?
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)))
}

async fn text_of(
    page: &dyn PageDriver,
    scope: &ElementRef,
    selector: &str,
) -> HarvestResult<Option<String>> {
    match page.query(Some(scope), selector).await? {
        Some(el) => Ok(Some(page.inner_text(Some(&el)).await?.trim().to_string())),
        None => Ok(None),
    }
}

fn parse_count(text: Option<&str>) -> Option<u32> {
    let digits: String = text?.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Read every chapter and its clips. Chapters without clips are dropped.
pub async fn read_sections(
    page: &dyn PageDriver,
    selectors: &CurriculumSelectors,
) -> HarvestResult<Vec<Section>> {
    let chapters = page.query_all(None, &selectors.chapter).await?;
    let mut sections = Vec::new();

    for (index, chapter) in chapters.iter().enumerate() {
        match read_chapter(page, chapter, index, selectors).await {
            Ok(section) if section.lessons.is_empty() => {
                warn!(index, title = %section.title, "section has no lectures; skipped");
            }
            Ok(section) => sections.push(section),
            Err(e) => warn!(index, error = %e, "section unreadable; skipped"),
        }
    }

    info!(
        sections = sections.len(),
        lectures = sections.iter().map(|s| s.lessons.len()).sum::<usize>(),
        "curriculum read"
    );
    Ok(sections)
}

async fn read_chapter(
    page: &dyn PageDriver,
    chapter: &ElementRef,
    index: usize,
    selectors: &CurriculumSelectors,
) -> HarvestResult<Section> {
    let title = text_of(page, chapter, &selectors.chapter_title)
        .await?
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Section {}", index + 1));
    let completed_count =
        parse_count(text_of(page, chapter, &selectors.chapter_completed).await?.as_deref());
    let total_count = parse_count(text_of(page, chapter, &selectors.chapter_total).await?.as_deref());

    let mut lessons = Vec::new();
    for clip in page.query_all(Some(chapter), &selectors.clip).await? {
        let Some(title) = text_of(page, &clip, &selectors.clip_title)
            .await?
            .filter(|t| !t.is_empty())
        else {
            continue;
        };
        let duration_text = text_of(page, &clip, &selectors.clip_time)
            .await?
            .unwrap_or_default();
        let is_completed = has_class(page, &clip, &selectors.clip_completed_class).await?;
        lessons.push(Lesson {
            title,
            duration_text,
            is_completed,
        });
    }

    if let (Some(total), false) = (total_count, lessons.is_empty()) {
        if total as usize != lessons.len() {
            debug!(index, total, read = lessons.len(), "clip count differs from header");
        }
    }

    Ok(Section {
        title,
        completed_count,
        total_count,
        lessons,
    })
}

/// Flatten sections into numbered lectures, section-major.
pub fn to_lectures(sections: &[Section]) -> Vec<NewLecture> {
    sections
        .iter()
        .enumerate()
        .flat_map(|(s, section)| {
            section
                .lessons
                .iter()
                .enumerate()
                .map(move |(l, lesson)| NewLecture {
                    section_number: s as i64 + 1,
                    section_title: section.title.clone(),
                    lecture_number: l as i64 + 1,
                    lecture_title: lesson.title.clone(),
                    lecture_minutes: minutes_or_zero(&lesson.duration_text, DurationContext::Lecture),
                    is_completed: lesson.is_completed,
                })
        })
        .collect()
}
