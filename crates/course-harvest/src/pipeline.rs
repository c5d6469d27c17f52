//! Run orchestration: discovery-seeded and drift-seeded harvests.
//!
//! Courses are processed one after another on the shared session. Every
//! course gets its own page, released on every exit path, and ends in
//! exactly one outcome; nothing a single course does aborts the batch.

use chrono::{Duration as ChronoDuration, Utc};
use std::path::PathBuf;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{HarvestConfig, RecrawlPolicy};
use crate::driver::PageDriver;
use crate::extract::{course_id_from_url, discover_courses, read_course_page, read_curriculum, to_lectures};
use crate::reconcile::Reconciler;
use crate::session::AuthenticatedSession;
use crate::store::{CourseFilter, CourseStore};
use crate::types::{Course, CourseOutcome, CourseRef, HarvestError, HarvestResult, NewLecture};

/// Courses updated within this window are skipped by `skip_recent` runs.
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Reason recorded when a course page yields no curriculum.
pub const NO_CURRICULUM: &str = "no curriculum sections found";

/// Which courses a discovery-seeded run visits.
///
/// `course_id` selects one course and overrides `target_only` and
/// `skip_recent`.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestFilter {
    pub course_id: Option<i64>,
    pub target_only: bool,
    pub skip_recent: bool,
    /// Refresh the course list from the site before selecting.
    pub discover: bool,
}

impl Default for HarvestFilter {
    fn default() -> Self {
        Self {
            course_id: None,
            target_only: false,
            skip_recent: false,
            discover: true,
        }
    }
}

impl HarvestFilter {
    pub fn course(course_id: i64) -> Self {
        Self {
            course_id: Some(course_id),
            ..Self::default()
        }
    }
}

/// What one course harvest read from the site.
struct Harvested {
    course: Course,
    lectures: Vec<NewLecture>,
}

pub struct Harvester<'a> {
    session: &'a AuthenticatedSession,
    store: &'a CourseStore,
    config: &'a HarvestConfig,
}

impl<'a> Harvester<'a> {
    pub fn new(
        session: &'a AuthenticatedSession,
        store: &'a CourseStore,
        config: &'a HarvestConfig,
    ) -> Self {
        Self {
            session,
            store,
            config,
        }
    }

    fn reconciler(&self) -> Reconciler<'a> {
        Reconciler::new(self.store)
    }

    /// Discover enrolled courses and register them in the store.
    pub async fn discover(&self) -> HarvestResult<Vec<CourseRef>> {
        let refs = discover_courses(self.session, self.config).await?;
        let inserted = self.store.register_discovered(&refs)?;
        info!(discovered = refs.len(), new = inserted, "course list refreshed");
        Ok(refs)
    }

    /// Harvest every course matching `filter`.
    pub async fn harvest_all(&self, filter: &HarvestFilter) -> HarvestResult<Vec<CourseOutcome>> {
        if filter.discover && filter.course_id.is_none() {
            if let Err(e) = self.discover().await {
                warn!(error = %e, "discovery failed; using stored course list");
            }
        }

        let store_filter = CourseFilter {
            course_id: filter.course_id,
            target_only: filter.target_only,
            updated_before: filter
                .skip_recent
                .then(|| Utc::now() - ChronoDuration::hours(RECENT_WINDOW_HOURS)),
        };
        let mut targets: Vec<CourseRef> = self
            .store
            .select_courses(&store_filter)?
            .into_iter()
            .map(|c| CourseRef {
                id: c.id,
                url: c.url,
                title: Some(c.title),
                display_order: c.display_order,
            })
            .collect();

        if let (Some(id), true) = (filter.course_id, targets.is_empty()) {
            targets.push(CourseRef {
                id,
                url: self.config.profile.course_url(&id.to_string()),
                title: None,
                display_order: None,
            });
        }

        Ok(self.run_batch(&targets).await)
    }

    /// Re-harvest courses whose lectures drift from their declared total by
    /// more than `threshold_ratio`.
    pub async fn harvest_drifted(&self, threshold_ratio: f64) -> HarvestResult<Vec<CourseOutcome>> {
        let reconciler = self.reconciler();
        let drifted = reconciler.find_drifted_courses(threshold_ratio)?;
        if drifted.is_empty() {
            info!(threshold_ratio, "no drifted courses");
            return Ok(Vec::new());
        }
        info!(count = drifted.len(), threshold_ratio, "drifted courses found");

        if self.config.recrawl_policy == RecrawlPolicy::PreClear {
            reconciler.selective_recrawl(&drifted)?;
        }
        Ok(self.run_batch(&drifted).await)
    }

    async fn run_batch(&self, targets: &[CourseRef]) -> Vec<CourseOutcome> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().enumerate() {
            let span = info_span!("course", id = target.id, n = index + 1, of = targets.len());
            outcomes.push(self.harvest_course(target).instrument(span).await);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            total = outcomes.len(),
            succeeded,
            failed = outcomes.len() - succeeded,
            "batch finished"
        );
        outcomes
    }

    /// Harvest one course and persist the result. Never fails; errors end
    /// up in the returned outcome and the crawl log.
    pub async fn harvest_course(&self, target: &CourseRef) -> CourseOutcome {
        let page = match self.session.open_page().await {
            Ok(page) => page,
            Err(e) => {
                return self
                    .reconciler()
                    .record_failure(target.id, format!("cannot open page: {e}"))
            }
        };

        let harvested = harvest_on(&*page, target, self.config).await;
        let outcome = match harvested {
            Ok(Harvested { course, lectures }) if lectures.is_empty() => {
                warn!(course_id = course.id, "no lectures read; keeping stored curriculum");
                self.reconciler().persist_partial(&course, NO_CURRICULUM)
            }
            Ok(Harvested { course, lectures }) => {
                self.reconciler().persist_harvest(&course, &lectures)
            }
            Err(e) => {
                warn!(error = %e, "course harvest failed");
                self.capture_failure(&*page, target.id).await;
                self.reconciler().record_failure(target.id, e.to_string())
            }
        };

        page.release().await;
        outcome
    }

    async fn capture_failure(&self, page: &dyn PageDriver, course_id: i64) {
        let Some(dir) = &self.config.screenshot_dir else {
            return;
        };
        let path = screenshot_path(dir, course_id);
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(error = %e, "screenshot directory unavailable");
            return;
        }
        match page.screenshot(&path).await {
            Ok(()) => info!(path = %path.display(), "failure screenshot saved"),
            Err(e) => warn!(error = %e, "failure screenshot not taken"),
        }
    }
}

fn screenshot_path(dir: &std::path::Path, course_id: i64) -> PathBuf {
    dir.join(format!(
        "course-{course_id}-{}.png",
        Utc::now().format("%Y%m%dT%H%M%S")
    ))
}

async fn harvest_on(
    page: &dyn PageDriver,
    target: &CourseRef,
    config: &HarvestConfig,
) -> HarvestResult<Harvested> {
    let profile = &config.profile;
    page.navigate(&target.url, config.timings.navigation_timeout)
        .await?;

    let url = page.current_url().await?;
    let title = page.title().await?;
    if profile.is_sign_in_page(&url, &title) {
        return Err(HarvestError::SessionExpired(target.url.clone()));
    }

    let course_id = course_id_from_url(&url, &profile.course_path_marker).unwrap_or(target.id);
    if course_id != target.id {
        warn!(expected = target.id, landed = course_id, "course page redirected");
        return Err(HarvestError::InvalidCourseUrl(url));
    }

    let header = read_course_page(page, course_id, profile).await?;
    let sections = read_curriculum(page, config).await?;
    let lectures = to_lectures(&sections);

    Ok(Harvested {
        course: Course {
            id: course_id,
            title: header.title,
            progress_percent: header.progress_percent,
            study_minutes: header.study_minutes,
            total_minutes: header.total_minutes,
            url: target.url.clone(),
            display_order: target.display_order,
            is_target: false,
            updated_at: None,
        },
        lectures,
    })
}
