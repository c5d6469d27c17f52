//! Page automation abstraction.
//!
//! Defines the `BrowserDriver` and `PageDriver` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). Everything
//! above this module talks to pages only through these traits.

pub mod chromium;
pub mod selector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Opaque handle to an element on a page. Only meaningful to the page that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

/// A browser cookie, in the shape needed to restore a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

/// Errors raised by a page driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("browser not available: {0}")]
    Unavailable(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid selector {0}")]
    Selector(String),

    #[error("stale element {0:?}")]
    StaleElement(ElementRef),

    #[error("script failed: {0}")]
    Script(String),

    #[error("{0}")]
    Protocol(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// A browser engine that can open pages sharing one authenticated context.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open a new blank page (tab).
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>>;
    /// Number of pages opened through this driver and not yet closed.
    fn open_pages(&self) -> usize;
}

/// A single browser page.
///
/// Element-scoped calls take an `ElementRef` previously returned by
/// `query`/`query_all`/`closest` on the same page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the load to finish, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()>;
    async fn current_url(&self) -> DriverResult<String>;
    async fn title(&self) -> DriverResult<String>;

    /// First element matching `selector`, page-wide or inside `scope`.
    async fn query(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> DriverResult<Option<ElementRef>>;
    /// All elements matching `selector`, in document order.
    async fn query_all(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> DriverResult<Vec<ElementRef>>;
    /// Nearest ancestor-or-self of `element` matching `selector`.
    async fn closest(&self, element: &ElementRef, selector: &str)
        -> DriverResult<Option<ElementRef>>;

    /// Rendered text of `element`, or of the page body when `None`.
    async fn inner_text(&self, element: Option<&ElementRef>) -> DriverResult<String>;
    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>>;
    async fn is_visible(&self, element: &ElementRef) -> DriverResult<bool>;

    async fn click(&self, element: &ElementRef) -> DriverResult<()>;
    async fn fill(&self, element: &ElementRef, value: &str) -> DriverResult<()>;
    async fn scroll_into_view(&self, element: &ElementRef) -> DriverResult<()>;

    /// Click `element` and report the address it leads to, whether it opens
    /// a new page or navigates this one. The new page is closed and a
    /// same-page navigation is reverted before returning.
    async fn click_and_follow(
        &self,
        element: &ElementRef,
        timeout: Duration,
    ) -> DriverResult<Option<String>>;

    /// Run `function` (a JS function declaration) with `this` bound to `element`.
    async fn call_on(&self, element: &ElementRef, function: &str)
        -> DriverResult<serde_json::Value>;
    /// Evaluate a JS expression in the page.
    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value>;

    async fn scroll_height(&self) -> DriverResult<i64>;
    async fn scroll_to_bottom(&self) -> DriverResult<()>;
    async fn scroll_to_top(&self) -> DriverResult<()>;
    async fn go_back(&self) -> DriverResult<()>;

    async fn screenshot(&self, path: &Path) -> DriverResult<()>;
    async fn cookies(&self) -> DriverResult<Vec<SessionCookie>>;
    async fn set_cookies(&self, cookies: &[SessionCookie]) -> DriverResult<()>;

    /// Close the page. Further calls on it fail.
    async fn close(&self) -> DriverResult<()>;

    /// Suspend for at least `duration`.
    async fn wait_for_timeout(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Wait until `selector` matches, polling every 250ms up to `timeout`.
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> DriverResult<Option<ElementRef>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(found) = self.query(None, selector).await? {
                return Ok(Some(found));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            self.wait_for_timeout(Duration::from_millis(250)).await;
        }
    }
}

/// Owns a page for the duration of one unit of work.
///
/// Call [`PageGuard::release`] on the normal path. If the guard is dropped
/// without being released (early return, `?`, panic unwinding inside a
/// task), the page is closed on a background task instead.
pub struct PageGuard {
    page: Arc<dyn PageDriver>,
    released: bool,
}

impl PageGuard {
    pub fn new(page: Box<dyn PageDriver>) -> Self {
        Self {
            page: Arc::from(page),
            released: false,
        }
    }

    /// Open a page on `browser` and guard it.
    pub async fn open(browser: &dyn BrowserDriver) -> DriverResult<Self> {
        Ok(Self::new(browser.new_page().await?))
    }

    /// Close the page now.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }
    }
}

impl Deref for PageGuard {
    type Target = dyn PageDriver;

    fn deref(&self) -> &Self::Target {
        &*self.page
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let page = Arc::clone(&self.page);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = page.close().await;
                });
            }
            Err(_) => tracing::warn!("page dropped outside a runtime; left open"),
        }
    }
}
