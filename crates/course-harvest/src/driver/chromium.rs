//! Chromium-backed page driver using chromiumoxide.

use super::selector::{self, js_string, ParsedSelector};
use super::{BrowserDriver, DriverError, DriverResult, ElementRef, PageDriver, SessionCookie};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. COURSE_HARVEST_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("COURSE_HARVEST_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.course-harvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".course-harvest/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".course-harvest/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".course-harvest/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".course-harvest/chromium/chrome-linux64/chrome"),
                home.join(".course-harvest/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Options for launching the browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub window: (u32, u32),
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window: (1920, 1080),
        }
    }
}

fn protocol(e: CdpError) -> DriverError {
    DriverError::Protocol(e.to_string())
}

/// Chromium browser shared by every page of a run.
pub struct ChromiumBrowser {
    browser: Arc<Browser>,
    open_count: Arc<AtomicUsize>,
}

impl ChromiumBrowser {
    /// Launch a Chromium instance.
    pub async fn launch(options: &LaunchOptions) -> DriverResult<Self> {
        let chrome_path = options.executable.clone().or_else(find_chromium).ok_or_else(|| {
            DriverError::Unavailable(
                "Chromium not found. Set COURSE_HARVEST_CHROMIUM_PATH or install Chrome."
                    .to_string(),
            )
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(options.window.0, options.window.1)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--lang=ko-KR");
        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| DriverError::Unavailable(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Unavailable(format!("failed to launch Chromium: {e}")))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            open_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumBrowser {
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(protocol)?;

        self.open_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumPage {
            page,
            browser: Arc::clone(&self.browser),
            elements: Mutex::new(Vec::new()),
            open_count: Arc::clone(&self.open_count),
            closed: std::sync::atomic::AtomicBool::new(false),
            tag_seq: AtomicU64::new(0),
        }))
    }

    fn open_pages(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page.
///
/// Elements handed out as `ElementRef` are kept alive in an arena until the
/// page closes; the ref is the arena index.
pub struct ChromiumPage {
    page: Page,
    browser: Arc<Browser>,
    elements: Mutex<Vec<Arc<Element>>>,
    open_count: Arc<AtomicUsize>,
    closed: std::sync::atomic::AtomicBool,
    tag_seq: AtomicU64,
}

impl ChromiumPage {
    fn store(&self, element: Element) -> ElementRef {
        let mut elements = self.elements.lock().unwrap_or_else(|p| p.into_inner());
        elements.push(Arc::new(element));
        ElementRef((elements.len() - 1) as u64)
    }

    fn element(&self, r: &ElementRef) -> DriverResult<Arc<Element>> {
        let elements = self.elements.lock().unwrap_or_else(|p| p.into_inner());
        elements
            .get(r.0 as usize)
            .cloned()
            .ok_or(DriverError::StaleElement(*r))
    }

    async fn find_all(
        &self,
        scope: Option<&ElementRef>,
        parsed: &ParsedSelector,
    ) -> DriverResult<Vec<Element>> {
        let found = match scope {
            Some(r) => self.element(r)?.find_elements(parsed.css.as_str()).await,
            None => self.page.find_elements(parsed.css.as_str()).await,
        };
        // chromiumoxide reports "no match" as an error
        let found = match found {
            Ok(found) => found,
            Err(e) => {
                debug!(selector = %parsed.css, error = %e, "query failed");
                Vec::new()
            }
        };

        if parsed.text.is_none() {
            return Ok(found);
        }
        let mut kept = Vec::new();
        for el in found {
            let text = el.inner_text().await.map_err(protocol)?.unwrap_or_default();
            if parsed.matches_text(&text) {
                kept.push(el);
            }
        }
        Ok(kept)
    }

    async fn eval_value(&self, script: &str) -> DriverResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn page_url(&self) -> DriverResult<String> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()> {
        let result = tokio::time::timeout(timeout, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::Timeout(timeout)),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.page_url().await
    }

    async fn title(&self) -> DriverResult<String> {
        Ok(self.page.get_title().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn query(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> DriverResult<Option<ElementRef>> {
        let parsed =
            selector::parse(selector).ok_or_else(|| DriverError::Selector(selector.to_string()))?;
        let found = self.find_all(scope, &parsed).await?;
        Ok(found.into_iter().next().map(|el| self.store(el)))
    }

    async fn query_all(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> DriverResult<Vec<ElementRef>> {
        let parsed =
            selector::parse(selector).ok_or_else(|| DriverError::Selector(selector.to_string()))?;
        let found = self.find_all(scope, &parsed).await?;
        Ok(found.into_iter().map(|el| self.store(el)).collect())
    }

    async fn closest(
        &self,
        element: &ElementRef,
        selector: &str,
    ) -> DriverResult<Option<ElementRef>> {
        let parsed =
            selector::parse(selector).ok_or_else(|| DriverError::Selector(selector.to_string()))?;
        let tag = format!("hv{}", self.tag_seq.fetch_add(1, Ordering::Relaxed));
        let function = format!(
            "function() {{ const el = this.closest('{}'); if (!el) return false; \
             el.setAttribute('data-harvest-ref', '{}'); return true; }}",
            js_string(&parsed.css),
            tag
        );
        let tagged = self.call_on(element, &function).await?;
        if tagged.as_bool() != Some(true) {
            return Ok(None);
        }
        self.query(None, &format!("[data-harvest-ref=\"{tag}\"]")).await
    }

    async fn inner_text(&self, element: Option<&ElementRef>) -> DriverResult<String> {
        match element {
            Some(r) => Ok(self
                .element(r)?
                .inner_text()
                .await
                .map_err(protocol)?
                .unwrap_or_default()),
            None => Ok(self
                .eval_value("document.body ? document.body.innerText : ''")
                .await?
                .as_str()
                .unwrap_or_default()
                .to_string()),
        }
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        self.element(element)?.attribute(name).await.map_err(protocol)
    }

    async fn is_visible(&self, element: &ElementRef) -> DriverResult<bool> {
        let visible = self
            .call_on(
                element,
                "function() { const r = this.getBoundingClientRect(); \
                 const s = window.getComputedStyle(this); \
                 return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }",
            )
            .await?;
        Ok(visible.as_bool().unwrap_or(false))
    }

    async fn click(&self, element: &ElementRef) -> DriverResult<()> {
        self.element(element)?.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> DriverResult<()> {
        let el = self.element(element)?;
        el.call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(protocol)?;
        el.click().await.map_err(protocol)?;
        el.type_str(value).await.map_err(protocol)?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> DriverResult<()> {
        self.element(element)?
            .scroll_into_view()
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn click_and_follow(
        &self,
        element: &ElementRef,
        timeout: Duration,
    ) -> DriverResult<Option<String>> {
        let before_url = self.page_url().await?;
        let before: HashSet<String> = self
            .browser
            .pages()
            .await
            .map_err(protocol)?
            .iter()
            .map(|p| p.target_id().inner().clone())
            .collect();

        self.click(element).await?;

        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(200)).await;

            for page in self.browser.pages().await.map_err(protocol)? {
                if before.contains(page.target_id().inner()) {
                    continue;
                }
                let url = page.url().await.map_err(protocol)?.unwrap_or_default();
                if url.is_empty() || url == "about:blank" {
                    continue;
                }
                let _ = page.close().await;
                return Ok(Some(url));
            }

            let now = self.page_url().await?;
            if now != before_url {
                self.go_back().await?;
                return Ok(Some(now));
            }
        }
        Ok(None)
    }

    async fn call_on(&self, element: &ElementRef, function: &str) -> DriverResult<serde_json::Value> {
        let returns = self
            .element(element)?
            .call_js_fn(function, false)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
    }

    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value> {
        self.eval_value(script).await
    }

    async fn scroll_height(&self) -> DriverResult<i64> {
        Ok(self
            .eval_value("document.body ? document.body.scrollHeight : 0")
            .await?
            .as_i64()
            .unwrap_or(0))
    }

    async fn scroll_to_bottom(&self) -> DriverResult<()> {
        self.eval_value("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        Ok(())
    }

    async fn scroll_to_top(&self) -> DriverResult<()> {
        self.eval_value("window.scrollTo(0, 0)").await?;
        Ok(())
    }

    async fn go_back(&self) -> DriverResult<()> {
        self.eval_value("history.back()").await?;
        let _ = self.page.wait_for_navigation().await;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> DriverResult<()> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn cookies(&self) -> DriverResult<Vec<SessionCookie>> {
        let cookies = self.page.get_cookies().await.map_err(protocol)?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
                expires: (c.expires > 0.0).then_some(c.expires),
            })
            .collect())
    }

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> DriverResult<()> {
        let mut params = Vec::with_capacity(cookies.len());
        for c in cookies {
            let mut builder = CookieParam::builder()
                .name(c.name.clone())
                .value(c.value.clone())
                .domain(c.domain.clone())
                .path(c.path.clone())
                .secure(c.secure)
                .http_only(c.http_only);
            if let Some(expires) = c.expires {
                builder = builder.expires(TimeSinceEpoch::new(expires));
            }
            params.push(builder.build().map_err(DriverError::Protocol)?);
        }
        self.page.set_cookies(params).await.map_err(protocol)?;
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.open_count.fetch_sub(1, Ordering::Relaxed);
        self.page.clone().close().await.map_err(protocol)?;
        Ok(())
    }
}
