//! Course discovery on the "my courses" listing.

use futures::FutureExt;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::course_page::course_id_from_url;
use crate::config::{HarvestConfig, SiteProfile};
use crate::driver::selector::js_string;
use crate::driver::{ElementRef, PageDriver};
use crate::session::AuthenticatedSession;
use crate::strategy::{click_first, Ranked, Resolved};
use crate::types::{CourseRef, HarvestError, HarvestResult};

/// Discover enrolled courses, in listing order.
pub async fn discover_courses(
    session: &AuthenticatedSession,
    config: &HarvestConfig,
) -> HarvestResult<Vec<CourseRef>> {
    let page = session.open_page().await?;
    let result = discover_on(&*page, config).await;
    page.release().await;
    result
}

/// Discovery on an already-open page.
pub async fn discover_on(page: &dyn PageDriver, config: &HarvestConfig) -> HarvestResult<Vec<CourseRef>> {
    let profile = &config.profile;
    let timings = &config.timings;

    page.navigate(&profile.my_courses_url, timings.navigation_timeout)
        .await?;
    let url = page.current_url().await?;
    let title = page.title().await?;
    if profile.is_sign_in_page(&url, &title) {
        return Err(HarvestError::SessionExpired(url));
    }
    page.wait_for_timeout(timings.tab_settle).await;

    if !profile.discovery.in_progress_tabs.is_empty() {
        match click_first(
            page,
            "in-progress tab",
            &profile.discovery.in_progress_tabs,
            timings.step_timeout,
        )
        .await
        {
            Ok(selector) => {
                debug!(selector = %selector, "in-progress tab activated");
                page.wait_for_timeout(timings.tab_settle).await;
            }
            Err(e) => debug!(error = %e, "no in-progress tab"),
        }
    }

    load_full_list(page, config).await?;

    let tile_count = page
        .query_all(None, &profile.discovery.course_tile)
        .await?
        .len();
    info!(tiles = tile_count, "course tiles found");

    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for index in 0..tile_count {
        // Strategy 4 may navigate; re-query so the tile handle is current.
        let tiles = page.query_all(None, &profile.discovery.course_tile).await?;
        let Some(tile) = tiles.get(index).copied() else {
            warn!(index, "tile list shrank during discovery");
            break;
        };

        let title = tile_title(page, &tile, profile).await;
        let resolved = match resolve_tile_url(page, &tile, index, config).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(index, title = ?title, error = %e, "no course URL for tile; skipped");
                continue;
            }
        };

        let Some(id) = course_id_from_url(&resolved.value, &profile.course_path_marker) else {
            warn!(index, url = %resolved.value, "course URL has no id; skipped");
            continue;
        };
        if !seen.insert(id) {
            debug!(id, "duplicate tile");
            continue;
        }

        debug!(id, strategy = %resolved.strategy, "tile resolved");
        refs.push(CourseRef {
            id,
            url: resolved.value,
            title,
            display_order: Some(refs.len() as i64 + 1),
        });
    }

    info!(courses = refs.len(), "discovery finished");
    Ok(refs)
}

/// Scroll until the page height stops growing, then return to the top.
async fn load_full_list(page: &dyn PageDriver, config: &HarvestConfig) -> HarvestResult<()> {
    let timings = &config.timings;
    let mut previous = page.scroll_height().await?;
    for iteration in 0..timings.max_scrolls {
        page.scroll_to_bottom().await?;
        page.wait_for_timeout(timings.scroll_settle).await;
        let height = page.scroll_height().await?;
        if height == previous {
            debug!(iterations = iteration + 1, height, "list fully loaded");
            break;
        }
        previous = height;
    }
    page.scroll_to_top().await?;
    page.wait_for_timeout(timings.scroll_settle).await;
    Ok(())
}

async fn tile_title(page: &dyn PageDriver, tile: &ElementRef, profile: &SiteProfile) -> Option<String> {
    let el = page
        .query(Some(tile), &profile.discovery.tile_title)
        .await
        .ok()??;
    let text = page.inner_text(Some(&el)).await.ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn absolutize(base: &str, href: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// Resolve one tile to a course URL, cheapest strategy first.
async fn resolve_tile_url(
    page: &dyn PageDriver,
    tile: &ElementRef,
    index: usize,
    config: &HarvestConfig,
) -> HarvestResult<Resolved<String>> {
    let profile = &config.profile;
    let selectors = &profile.discovery;
    let timings = &config.timings;

    Ranked::new(
        format!("course URL of tile {index}"),
        timings.step_timeout + timings.follow_timeout,
    )
    .then("anchor href", move || {
        async move {
            let Some(link) = page.query(Some(tile), &selectors.course_link).await? else {
                return Ok(None);
            };
            let href = page.attribute(&link, "href").await?;
            Ok::<_, HarvestError>(href.and_then(|h| absolutize(&profile.base_url, &h)))
        }
        .boxed()
    })
    .then("enter-button attribute", move || {
        async move {
            let Some(button) = page.query(Some(tile), &selectors.enter_button).await? else {
                return Ok(None);
            };
            for attr in &selectors.id_attributes {
                if let Some(id) = page.attribute(&button, attr).await? {
                    let id = id.trim();
                    if !id.is_empty() {
                        return Ok(Some(profile.course_url(id)));
                    }
                }
            }
            Ok::<_, HarvestError>(None)
        }
        .boxed()
    })
    .then("in-page script", move || {
        async move {
            let script = tile_script(profile, index);
            let value = page.evaluate(&script).await?;
            Ok::<_, HarvestError>(
                value
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string()),
            )
        }
        .boxed()
    })
    .then("follow enter button", move || {
        async move {
            let Some(button) = page.query(Some(tile), &selectors.enter_button).await? else {
                return Ok(None);
            };
            Ok::<_, HarvestError>(page.click_and_follow(&button, timings.follow_timeout).await?)
        }
        .boxed()
    })
    .resolve()
    .await
}

/// Script that reads the course URL of tile `index` straight from the DOM,
/// including any all-digit `data-*` value on the enter button.
fn tile_script(profile: &SiteProfile, index: usize) -> String {
    let d = &profile.discovery;
    let attrs = d
        .id_attributes
        .iter()
        .map(|a| format!("'{}'", js_string(a)))
        .collect::<Vec<_>>()
        .join(", ");
    let course_base = js_string(&profile.course_url(""));
    format!(
        "(() => {{ \
            const tile = document.querySelectorAll('{tile}')[{index}]; \
            if (!tile) return null; \
            const link = tile.querySelector('{link}'); \
            if (link && link.href) return link.href; \
            const button = tile.querySelector('{button}'); \
            if (!button) return null; \
            for (const name of [{attrs}]) {{ \
                const v = button.getAttribute(name); \
                if (v) return '{course_base}' + v; \
            }} \
            for (const v of Object.values(button.dataset)) {{ \
                if (/^\\d+$/.test(v)) return '{course_base}' + v; \
            }} \
            return null; \
        }})()",
        tile = js_string(&d.course_tile),
        link = js_string(&d.course_link),
        button = js_string(&d.enter_button),
    )
}
