//! Authenticated session handle.
//!
//! The session wraps the browser whose context carries the sign-in cookies.
//! It is passed explicitly to every discovery and extraction call; nothing
//! about the signed-in state lives in globals.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::HarvestConfig;
use crate::driver::{BrowserDriver, DriverResult, PageGuard, SessionCookie};
use crate::types::{HarvestError, HarvestResult};

pub struct AuthenticatedSession {
    browser: Arc<dyn BrowserDriver>,
    landed_url: String,
    authenticated_at: DateTime<Utc>,
}

impl std::fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("landed_url", &self.landed_url)
            .field("authenticated_at", &self.authenticated_at)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedSession {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        landed_url: impl Into<String>,
        authenticated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            browser,
            landed_url: landed_url.into(),
            authenticated_at,
        }
    }

    pub fn landed_url(&self) -> &str {
        &self.landed_url
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    pub fn browser(&self) -> &dyn BrowserDriver {
        self.browser.as_ref()
    }

    /// Open a page in the signed-in context.
    pub async fn open_page(&self) -> DriverResult<PageGuard> {
        PageGuard::open(self.browser.as_ref()).await
    }

    /// Write the session cookies to `path` as JSON. Returns how many were
    /// saved.
    pub async fn export_cookies(&self, path: &Path, config: &HarvestConfig) -> HarvestResult<usize> {
        let page = self.open_page().await?;
        let cookies = async {
            page.navigate(&config.profile.base_url, config.timings.navigation_timeout)
                .await?;
            page.cookies().await
        }
        .await;
        page.release().await;

        let cookies = cookies?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&cookies)?)?;
        info!(path = %path.display(), count = cookies.len(), "cookies saved");
        Ok(cookies.len())
    }

    /// Restore cookies saved by [`export_cookies`](Self::export_cookies) and
    /// check that they still sign the browser in.
    ///
    /// Returns `Ok(None)` when the cookies no longer work.
    pub async fn restore(
        browser: Arc<dyn BrowserDriver>,
        path: &Path,
        config: &HarvestConfig,
    ) -> HarvestResult<Option<Self>> {
        let data = std::fs::read_to_string(path)?;
        let cookies: Vec<SessionCookie> = serde_json::from_str(&data)?;
        if cookies.is_empty() {
            return Err(HarvestError::InvalidData(format!(
                "no cookies in {}",
                path.display()
            )));
        }

        let page = PageGuard::open(browser.as_ref()).await?;
        let landed = async {
            page.set_cookies(&cookies).await?;
            page.navigate(&config.profile.my_courses_url, config.timings.navigation_timeout)
                .await?;
            let url = page.current_url().await?;
            let title = page.title().await?;
            Ok::<_, HarvestError>((url, title))
        }
        .await;
        page.release().await;

        let (url, title) = landed?;
        if !config.profile.is_signed_in_location(&url, &title) {
            warn!(url = %url, "saved cookies no longer sign in");
            return Ok(None);
        }
        info!(count = cookies.len(), url = %url, "session restored from cookies");
        Ok(Some(Self::new(browser, url, Utc::now())))
    }
}
