//! Course Harvest: signs in to a course site, discovers enrolled courses,
//! extracts progress and curriculum, and reconciles them into SQLite.

pub mod auth;
pub mod config;
pub mod driver;
pub mod duration;
pub mod extract;
pub mod pipeline;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod strategy;
pub mod types;

pub use auth::{authenticate, AuthFailure, AuthState};
pub use config::{Credentials, HarvestConfig, RecrawlPolicy, SiteProfile, Timings};
pub use driver::chromium::{find_chromium, ChromiumBrowser, LaunchOptions};
pub use driver::{BrowserDriver, DriverError, ElementRef, PageDriver, PageGuard, SessionCookie};
pub use duration::{normalize, DurationContext};
pub use pipeline::{HarvestFilter, Harvester};
pub use reconcile::{Reconciler, DEFAULT_DRIFT_THRESHOLD};
pub use session::AuthenticatedSession;
pub use store::{CourseFilter, CourseStore};
pub use types::*;
