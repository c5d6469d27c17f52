//! Ranked fallback strategies and bounded polling.
//!
//! A [`Ranked`] holds `(description, attempt)` pairs tried in order. Each
//! attempt runs under its own timeout; an attempt that errors, times out or
//! finds nothing falls through to the next one. The first attempt that
//! yields a value wins and the remaining attempts are never started.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::driver::{ElementRef, PageDriver};
use crate::types::{HarvestError, HarvestResult};

/// The future one attempt produces.
pub type Attempt<'a, T> = BoxFuture<'a, HarvestResult<Option<T>>>;

type AttemptFn<'a, T> = Box<dyn FnOnce() -> Attempt<'a, T> + Send + 'a>;

/// Value produced by the winning attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub strategy: String,
    /// Zero-based rank of the winning attempt.
    pub rank: usize,
}

/// Ordered list of fallback attempts.
pub struct Ranked<'a, T> {
    what: String,
    step_timeout: Duration,
    attempts: Vec<(String, AttemptFn<'a, T>)>,
}

impl<'a, T: Send + 'a> Ranked<'a, T> {
    /// `what` names the thing being resolved in logs and errors.
    pub fn new(what: impl Into<String>, step_timeout: Duration) -> Self {
        Self {
            what: what.into(),
            step_timeout,
            attempts: Vec::new(),
        }
    }

    /// Append an attempt.
    pub fn then<F>(mut self, description: impl Into<String>, attempt: F) -> Self
    where
        F: FnOnce() -> Attempt<'a, T> + Send + 'a,
    {
        self.attempts.push((description.into(), Box::new(attempt)));
        self
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Run attempts in order until one yields a value.
    pub async fn resolve(self) -> HarvestResult<Resolved<T>> {
        let what = self.what;
        for (rank, (description, attempt)) in self.attempts.into_iter().enumerate() {
            match tokio::time::timeout(self.step_timeout, attempt()).await {
                Ok(Ok(Some(value))) => {
                    debug!(what = %what, strategy = %description, rank, "strategy matched");
                    return Ok(Resolved {
                        value,
                        strategy: description,
                        rank,
                    });
                }
                Ok(Ok(None)) => {
                    debug!(what = %what, strategy = %description, "strategy found nothing");
                }
                Ok(Err(e)) => {
                    debug!(what = %what, strategy = %description, error = %e, "strategy failed");
                }
                Err(_) => {
                    debug!(
                        what = %what,
                        strategy = %description,
                        timeout_ms = self.step_timeout.as_millis() as u64,
                        "strategy timed out"
                    );
                }
            }
        }
        Err(HarvestError::FallbackExhausted(what))
    }
}

/// First element matching any of `selectors`, optionally only visible ones.
pub async fn first_match(
    page: &dyn PageDriver,
    what: &str,
    selectors: &[String],
    visible_only: bool,
    step_timeout: Duration,
) -> HarvestResult<Resolved<ElementRef>> {
    let mut ranked = Ranked::new(what, step_timeout);
    for selector in selectors {
        ranked = ranked.then(selector.as_str(), move || {
            async move {
                let Some(el) = page.query(None, selector).await? else {
                    return Ok(None);
                };
                if visible_only && !page.is_visible(&el).await? {
                    return Ok(None);
                }
                Ok::<_, HarvestError>(Some(el))
            }
            .boxed()
        });
    }
    ranked.resolve().await
}

/// Click the first element matching any of `selectors`.
pub async fn click_first(
    page: &dyn PageDriver,
    what: &str,
    selectors: &[String],
    step_timeout: Duration,
) -> HarvestResult<String> {
    let mut ranked = Ranked::new(what, step_timeout);
    for selector in selectors {
        ranked = ranked.then(selector.as_str(), move || {
            async move {
                let Some(el) = page.query(None, selector).await? else {
                    return Ok(None);
                };
                page.click(&el).await?;
                Ok::<_, HarvestError>(Some(()))
            }
            .boxed()
        });
    }
    Ok(ranked.resolve().await?.strategy)
}

/// Fill the first element matching any of `selectors` with `value`.
pub async fn fill_first(
    page: &dyn PageDriver,
    what: &str,
    selectors: &[String],
    value: &str,
    step_timeout: Duration,
) -> HarvestResult<String> {
    let mut ranked = Ranked::new(what, step_timeout);
    for selector in selectors {
        ranked = ranked.then(selector.as_str(), move || {
            async move {
                let Some(el) = page.query(None, selector).await? else {
                    return Ok(None);
                };
                page.fill(&el, value).await?;
                Ok::<_, HarvestError>(Some(()))
            }
            .boxed()
        });
    }
    Ok(ranked.resolve().await?.strategy)
}

/// Poll a check at a fixed interval until it yields a value or the ceiling
/// passes. The check always runs at least once, and once more at the
/// ceiling itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    pub interval: Duration,
    pub ceiling: Duration,
}

impl Poll {
    pub fn new(interval: Duration, ceiling: Duration) -> Self {
        Self { interval, ceiling }
    }

    /// Run `check(attempt)` until it returns `Some`.
    pub async fn until<T, F, Fut>(&self, mut check: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let deadline = tokio::time::Instant::now() + self.ceiling;
        let mut attempt = 0u32;
        loop {
            if let Some(value) = check(attempt).await {
                return Some(value);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let wait = self.interval.min(deadline - now);
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

/// Retry `step` up to `attempts` times, waiting `backoff` between tries.
/// Returns the first `true`.
pub async fn retry<F, Fut>(attempts: u32, backoff: Duration, mut step: F) -> bool
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 0..attempts {
        if step(attempt).await {
            return true;
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(backoff).await;
        }
    }
    false
}
