//! Subcommand implementations for the `course-harvest` binary.

pub mod courses;
pub mod discover;
pub mod doctor;
pub mod drift;
pub mod harvest;
pub mod login;
pub mod target;

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use course_harvest::{
    authenticate, AuthenticatedSession, BrowserDriver, ChromiumBrowser, CourseOutcome,
    CourseStore, Credentials, HarvestConfig, LaunchOptions, RunSummary,
};

use crate::config::resolve_cookie_path;
use crate::output;

/// Options shared by commands that drive a browser.
#[derive(Debug, Clone, Default, Args)]
pub struct BrowserArgs {
    /// Saved session cookies to try before signing in
    /// (default: $COURSE_HARVEST_COOKIES or ~/.course-harvest/cookies.json).
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Run Chromium without a window.
    #[arg(long)]
    pub headless: bool,

    /// Save a screenshot here whenever a course fails.
    #[arg(long)]
    pub screenshots: Option<PathBuf>,
}

/// Open (or create) the store at `db`.
pub fn open_store(db: &Path) -> Result<CourseStore> {
    CourseStore::open(db).with_context(|| format!("cannot open database {}", db.display()))
}

pub async fn launch_browser(args: &BrowserArgs) -> Result<Arc<dyn BrowserDriver>> {
    let options = LaunchOptions {
        headless: args.headless,
        ..LaunchOptions::default()
    };
    let browser = ChromiumBrowser::launch(&options).await?;
    Ok(Arc::new(browser))
}

/// A signed-in session: saved cookies when they still work, otherwise a
/// full sign-in with credentials from the environment.
pub async fn open_session(args: &BrowserArgs, config: &HarvestConfig) -> Result<AuthenticatedSession> {
    let browser = launch_browser(args).await?;

    let cookie_path = resolve_cookie_path(args.cookies.as_deref());
    if cookie_path.exists() {
        match AuthenticatedSession::restore(Arc::clone(&browser), &cookie_path, config).await {
            Ok(Some(session)) => return Ok(session),
            Ok(None) => info!(path = %cookie_path.display(), "saved cookies expired; signing in"),
            Err(e) => warn!(path = %cookie_path.display(), error = %e, "saved cookies unusable; signing in"),
        }
    }

    let credentials = Credentials::from_env()?;
    let session = authenticate(browser, &credentials, config).await?;
    Ok(session)
}

/// Print a run's per-course outcomes and tally.
pub fn report_outcomes(outcomes: Vec<CourseOutcome>) {
    let summary = RunSummary::from_outcomes(outcomes);
    if output::is_json() {
        output::print_json(&summary);
        return;
    }

    if summary.outcomes.is_empty() {
        eprintln!("  No courses matched.");
        return;
    }
    for outcome in &summary.outcomes {
        match &outcome.error_message {
            None => println!("  [OK] {}", outcome.course_id),
            Some(reason) => println!("  [!!] {}  {reason}", outcome.course_id),
        }
    }
    println!();
    println!(
        "  {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
}
