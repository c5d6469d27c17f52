//! Site profile, timing and credential configuration.
//!
//! The default [`SiteProfile`] describes the supported course site. Every
//! ordered list in it is a fallback chain: candidates are tried in order and
//! the first one that matches wins. A profile can be overridden from a JSON
//! file; fields missing from the file keep their defaults.
//!
//! ## Credentials
//!
//! Loaded from (in order of priority):
//! 1. `COURSE_HARVEST_SECRET_FILE` env → reads the secret from the file path
//! 2. `COURSE_HARVEST_SECRET` env → uses the value directly (visible in `ps`)
//!
//! The login id always comes from `COURSE_HARVEST_LOGIN_ID`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{HarvestError, HarvestResult};

/// Selectors, addresses and labels for one course site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Scheme and host, used to absolutize relative links.
    pub base_url: String,
    /// Host a signed-in session lands on.
    pub site_host: String,
    pub login_url: String,
    pub my_courses_url: String,
    /// Path segment that precedes the course id in a classroom URL.
    pub course_path_marker: String,

    pub login: LoginSelectors,
    pub discovery: DiscoverySelectors,
    pub curriculum: CurriculumSelectors,
    pub labels: PageLabels,
}

/// Fallback chains for the sign-in flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSelectors {
    pub provider_buttons: Vec<String>,
    pub identifier_fields: Vec<String>,
    pub secret_fields: Vec<String>,
    pub submit_buttons: Vec<String>,
    pub continue_buttons: Vec<String>,
    /// URL fragments that mean the browser is still inside the sign-in flow.
    pub sign_in_url_markers: Vec<String>,
    /// Title fragments that mean the same.
    pub sign_in_title_markers: Vec<String>,
}

/// Selectors for the "my courses" listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySelectors {
    /// Optional "in progress" tab, activated before scrolling.
    pub in_progress_tabs: Vec<String>,
    pub course_tile: String,
    pub tile_title: String,
    pub course_link: String,
    pub enter_button: String,
    /// Attributes on the enter button that may carry the course id.
    pub id_attributes: Vec<String>,
}

/// Selectors for the classroom curriculum sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurriculumSelectors {
    pub container: String,
    pub accordion_header: String,
    pub accordion_arrow: String,
    pub accordion_node: String,
    /// Class present on an expanded accordion node.
    pub open_class: String,
    pub chapter: String,
    pub chapter_title: String,
    pub chapter_completed: String,
    pub chapter_total: String,
    pub clip: String,
    pub clip_title: String,
    pub clip_time: String,
    /// Class present on a completed clip.
    pub clip_completed_class: String,
    pub heading: String,
}

/// Labels that precede values in the course header text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLabels {
    pub progress: String,
    pub study_time: String,
    pub total_time: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: "https://fastcampus.co.kr".to_string(),
            site_host: "fastcampus.co.kr".to_string(),
            login_url: "https://fastcampus.co.kr/account/sign-in".to_string(),
            my_courses_url: "https://fastcampus.co.kr/me/courses".to_string(),
            course_path_marker: "classroom".to_string(),
            login: LoginSelectors::default(),
            discovery: DiscoverySelectors::default(),
            curriculum: CurriculumSelectors::default(),
            labels: PageLabels::default(),
        }
    }
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            provider_buttons: strings(&[
                "button:has-text(\"카카오로 1초 만에 시작하기\")",
                "button:has-text(\"카카오\")",
                "[class*=\"kakao\"]",
            ]),
            identifier_fields: strings(&[
                "input[name=\"loginId\"]",
                "input[type=\"email\"]",
                "#loginId",
            ]),
            secret_fields: strings(&[
                "input[name=\"password\"]",
                "input[type=\"password\"]",
                "#password",
            ]),
            submit_buttons: strings(&[
                "button[type=\"submit\"]",
                "button:has-text(\"로그인\")",
                ".btn_confirm",
            ]),
            continue_buttons: strings(&[
                "button.btn_confirm",
                "button:has-text(\"Continue\")",
                "button:has-text(\"확인\")",
            ]),
            sign_in_url_markers: strings(&["sign-in", "kakao"]),
            sign_in_title_markers: strings(&["인증"]),
        }
    }
}

impl Default for DiscoverySelectors {
    fn default() -> Self {
        Self {
            in_progress_tabs: strings(&[
                "button:has-text(\"수강중\")",
                "a:has-text(\"수강중\")",
            ]),
            course_tile: ".vn-me-courses__box".to_string(),
            tile_title: ".vn-me-courses__title".to_string(),
            course_link: "a[href*=\"/classroom/\"]".to_string(),
            enter_button: "button[data-e2e=\"classroom-enter-button\"]".to_string(),
            id_attributes: strings(&["data-course-id", "data-id", "data-key"]),
        }
    }
}

impl Default for CurriculumSelectors {
    fn default() -> Self {
        Self {
            container: ".classroom-sidebar-clip__chapter".to_string(),
            accordion_header: ".common-accordion-menu__header".to_string(),
            accordion_arrow: ".common-accordion-menu__header__arrow-icon".to_string(),
            accordion_node: ".common-accordion-menu".to_string(),
            open_class: "common-accordion-menu--open".to_string(),
            chapter: ".classroom-sidebar-clip__chapter".to_string(),
            chapter_title: ".classroom-sidebar-clip__chapter__title__text".to_string(),
            chapter_completed: ".classroom-sidebar-clip__chapter__title__number__complete"
                .to_string(),
            chapter_total: ".classroom-sidebar-clip__chapter__title__number__total".to_string(),
            clip: ".classroom-sidebar-clip__chapter__clip".to_string(),
            clip_title: ".classroom-sidebar-clip__chapter__clip__title".to_string(),
            clip_time: ".classroom-sidebar-clip__chapter__clip__time".to_string(),
            clip_completed_class: "classroom-sidebar-clip__chapter__clip--complete".to_string(),
            heading: "header h1, h1".to_string(),
        }
    }
}

impl Default for PageLabels {
    fn default() -> Self {
        Self {
            progress: "수강률".to_string(),
            study_time: "수강시간".to_string(),
            total_time: "강의시간".to_string(),
        }
    }
}

impl SiteProfile {
    /// Load a profile from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> HarvestResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&data)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> HarvestResult<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| HarvestError::Config(format!("base_url {}: {e}", self.base_url)))?;
        for (name, list) in [
            ("provider_buttons", &self.login.provider_buttons),
            ("identifier_fields", &self.login.identifier_fields),
            ("secret_fields", &self.login.secret_fields),
            ("submit_buttons", &self.login.submit_buttons),
        ] {
            if list.is_empty() {
                return Err(HarvestError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Whether `url`/`title` show the browser inside the sign-in flow.
    pub fn is_sign_in_page(&self, url: &str, title: &str) -> bool {
        self.login
            .sign_in_url_markers
            .iter()
            .any(|m| url.contains(m.as_str()))
            || self
                .login
                .sign_in_title_markers
                .iter()
                .any(|m| title.contains(m.as_str()))
    }

    /// Whether `url`/`title` show a signed-in page of the course site.
    pub fn is_signed_in_location(&self, url: &str, title: &str) -> bool {
        url.contains(self.site_host.as_str()) && !self.is_sign_in_page(url, title)
    }

    /// Absolute classroom URL for a course id.
    pub fn course_url(&self, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.course_path_marker,
            id
        )
    }
}

/// Waits and timeouts used across the pipeline.
///
/// Fixed delays are minimum waits for the site's animations and redirects;
/// lowering them makes accordion reads and sign-in detection flaky.
#[derive(Debug, Clone, PartialEq)]
pub struct Timings {
    /// Bound on a single selector step before falling through.
    pub step_timeout: Duration,
    pub navigation_timeout: Duration,
    /// Wait after opening the sign-in page.
    pub login_page_settle: Duration,
    /// Wait after choosing the identity provider.
    pub provider_settle: Duration,
    pub second_factor_interval: Duration,
    pub second_factor_ceiling: Duration,
    /// Wait after activating a continue/confirm button.
    pub continue_settle: Duration,
    /// Wait after each scroll while loading the course list.
    pub scroll_settle: Duration,
    pub max_scrolls: u32,
    pub tab_settle: Duration,
    /// Bound on the new-page capture of the last discovery strategy.
    pub follow_timeout: Duration,
    pub curriculum_wait: Duration,
    pub curriculum_settle: Duration,
    /// Wait after scrolling an accordion header into view.
    pub accordion_scroll_settle: Duration,
    /// Wait after activating an accordion header.
    pub accordion_settle: Duration,
    /// Wait between expansion passes.
    pub accordion_pass_settle: Duration,
    /// Wait after the last pass before reading sections.
    pub accordion_final_settle: Duration,
    pub accordion_passes: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(60),
            login_page_settle: Duration::from_secs(8),
            provider_settle: Duration::from_secs(3),
            second_factor_interval: Duration::from_secs(2),
            second_factor_ceiling: Duration::from_secs(90),
            continue_settle: Duration::from_secs(3),
            scroll_settle: Duration::from_secs(2),
            max_scrolls: 20,
            tab_settle: Duration::from_secs(2),
            follow_timeout: Duration::from_secs(5),
            curriculum_wait: Duration::from_secs(10),
            curriculum_settle: Duration::from_secs(2),
            accordion_scroll_settle: Duration::from_millis(300),
            accordion_settle: Duration::from_millis(800),
            accordion_pass_settle: Duration::from_secs(2),
            accordion_final_settle: Duration::from_secs(3),
            accordion_passes: 2,
        }
    }
}

/// What a recrawl does with existing lectures of a drifted course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecrawlPolicy {
    /// Delete lectures of every drifted course before re-harvesting.
    #[default]
    PreClear,
    /// Leave lectures in place until a harvest of that course succeeds.
    ReplaceOnSuccess,
}

/// Everything a run needs besides the session and the store.
#[derive(Debug, Clone, Default)]
pub struct HarvestConfig {
    pub profile: SiteProfile,
    pub timings: Timings,
    pub recrawl_policy: RecrawlPolicy,
    /// Where to save a full-page screenshot when a course fails.
    pub screenshot_dir: Option<PathBuf>,
}

/// Sign-in credentials.
#[derive(Clone)]
pub struct Credentials {
    pub login_id: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login_id", &self.login_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(login_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            login_id: login_id.into(),
            secret: secret.into(),
        }
    }

    /// Load credentials from the environment.
    pub fn from_env() -> HarvestResult<Self> {
        let login_id = std::env::var("COURSE_HARVEST_LOGIN_ID")
            .map_err(|_| HarvestError::Config("COURSE_HARVEST_LOGIN_ID is not set".to_string()))?;

        // 1. COURSE_HARVEST_SECRET_FILE (recommended)
        if let Ok(path) = std::env::var("COURSE_HARVEST_SECRET_FILE") {
            let secret = std::fs::read_to_string(&path).map_err(|e| {
                HarvestError::Config(format!("cannot read secret file '{path}': {e}"))
            })?;
            let secret = secret.trim_end_matches(['\r', '\n']).to_string();
            if secret.is_empty() {
                return Err(HarvestError::Config(format!("secret file '{path}' is empty")));
            }
            return Ok(Self::new(login_id, secret));
        }

        // 2. COURSE_HARVEST_SECRET (visible in the process list)
        match std::env::var("COURSE_HARVEST_SECRET") {
            Ok(secret) if !secret.is_empty() => Ok(Self::new(login_id, secret)),
            _ => Err(HarvestError::Config(
                "set COURSE_HARVEST_SECRET_FILE or COURSE_HARVEST_SECRET".to_string(),
            )),
        }
    }
}
