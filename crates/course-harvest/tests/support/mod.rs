//! Scripted in-memory browser for integration tests.
//!
//! A `Dom` is a flat set of nodes plus explicit selector tables: which
//! nodes a selector matches page-wide or inside a scope, which ancestor
//! `closest` returns, and what each click does. Selectors are opaque
//! strings; nothing is parsed. Every driver call is appended to a shared
//! call log so tests can assert on what the pipeline did and did not try.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use course_harvest::config::CurriculumSelectors;
use course_harvest::driver::{
    BrowserDriver, DriverError, DriverResult, ElementRef, PageDriver, SessionCookie,
};

/// Side effect of clicking a node.
#[derive(Debug, Clone)]
pub enum Action {
    AddClass(u64, String),
    SetLocation { url: String, title: String },
    /// Make `id` match `selector` page-wide.
    Reveal { selector: String, id: u64 },
    /// Make `id` match `selector` inside `scope`.
    RevealIn { scope: u64, selector: String, id: u64 },
}

#[derive(Debug, Clone, Default)]
struct Node {
    text: String,
    attrs: HashMap<String, String>,
    hidden: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Dom {
    pub url: String,
    pub title: String,
    pub body: String,
    nodes: HashMap<u64, Node>,
    global: HashMap<String, Vec<u64>>,
    scoped: HashMap<(u64, String), Vec<u64>>,
    closest: HashMap<(u64, String), u64>,
    on_click: HashMap<u64, VecDeque<Vec<Action>>>,
    follow: HashMap<u64, String>,
    scripts: Vec<(String, Value)>,
    heights: VecDeque<i64>,
    next_id: u64,
}

impl Dom {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn body(mut self, text: &str) -> Self {
        self.body = text.to_string();
        self
    }

    /// Add a visible node with `text`.
    pub fn node(&mut self, text: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                text: text.to_string(),
                ..Node::default()
            },
        );
        id
    }

    pub fn attr(&mut self, id: u64, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn hide(&mut self, id: u64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.hidden = true;
        }
    }

    /// `selector` matches `id` page-wide.
    pub fn at(&mut self, selector: &str, id: u64) {
        self.global.entry(selector.to_string()).or_default().push(id);
    }

    /// `selector` matches `id` inside `scope`.
    pub fn within(&mut self, scope: u64, selector: &str, id: u64) {
        self.scoped
            .entry((scope, selector.to_string()))
            .or_default()
            .push(id);
    }

    pub fn closest_of(&mut self, id: u64, selector: &str, ancestor: u64) {
        self.closest.insert((id, selector.to_string()), ancestor);
    }

    /// Queue the effects of the next click on `id`. Each click consumes one
    /// entry; clicks past the queue do nothing.
    pub fn on_click(&mut self, id: u64, actions: Vec<Action>) {
        self.on_click.entry(id).or_default().push_back(actions);
    }

    /// The next click on `id` has no effect.
    pub fn ignore_next_click(&mut self, id: u64) {
        self.on_click.entry(id).or_default().push_front(Vec::new());
    }

    pub fn follows(&mut self, id: u64, url: &str) {
        self.follow.insert(id, url.to_string());
    }

    /// Scripts containing `needle` evaluate to `value`.
    pub fn script(&mut self, needle: &str, value: Value) {
        self.scripts.push((needle.to_string(), value));
    }

    /// Successive `scroll_height` readings; the last one repeats.
    pub fn heights(&mut self, heights: &[i64]) {
        self.heights = heights.iter().copied().collect();
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::AddClass(id, class) => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    let classes = node.attrs.entry("class".to_string()).or_default();
                    if !classes.is_empty() {
                        classes.push(' ');
                    }
                    classes.push_str(&class);
                }
            }
            Action::SetLocation { url, title } => {
                self.url = url;
                self.title = title;
            }
            Action::Reveal { selector, id } => self.at(&selector, id),
            Action::RevealIn {
                scope,
                selector,
                id,
            } => self.within(scope, &selector, id),
        }
    }
}

/// One lecture row in a scripted classroom sidebar.
#[derive(Debug, Clone)]
pub struct ClipSpec {
    pub title: &'static str,
    pub time: &'static str,
    pub completed: bool,
}

pub fn clip(title: &'static str, time: &'static str, completed: bool) -> ClipSpec {
    ClipSpec {
        title,
        time,
        completed,
    }
}

/// One chapter; `depth` is how many nested accordions guard its clips.
#[derive(Debug, Clone)]
pub struct ChapterSpec {
    pub title: &'static str,
    pub clips: Vec<ClipSpec>,
    pub depth: usize,
}

pub fn chapter(title: &'static str, clips: Vec<ClipSpec>) -> ChapterSpec {
    ChapterSpec {
        title,
        clips,
        depth: 1,
    }
}

/// Add a chapter whose clips appear only after its accordions are opened.
/// Returns the chapter node and its accordion headers, outermost first.
pub fn add_chapter(dom: &mut Dom, sel: &CurriculumSelectors, layout: &ChapterSpec) -> (u64, Vec<u64>) {
    let chapter = dom.node(layout.title);
    dom.at(&sel.chapter, chapter);
    let title = dom.node(layout.title);
    dom.within(chapter, &sel.chapter_title, title);

    let mut clip_reveals = Vec::new();
    for c in &layout.clips {
        let clip = dom.node(c.title);
        let class = if c.completed {
            format!("classroom-sidebar-clip__chapter__clip {}", sel.clip_completed_class)
        } else {
            "classroom-sidebar-clip__chapter__clip".to_string()
        };
        dom.attr(clip, "class", &class);
        let title = dom.node(c.title);
        dom.within(clip, &sel.clip_title, title);
        let time = dom.node(c.time);
        dom.within(clip, &sel.clip_time, time);
        clip_reveals.push(Action::RevealIn {
            scope: chapter,
            selector: sel.clip.clone(),
            id: clip,
        });
    }

    let mut headers = Vec::new();
    for level in 0..layout.depth.max(1) {
        let header = dom.node(layout.title);
        let arrow = dom.node("");
        dom.within(header, &sel.accordion_arrow, arrow);
        let node = dom.node("");
        dom.attr(node, "class", "common-accordion-menu");
        dom.closest_of(header, &sel.accordion_node, node);
        if level == 0 {
            dom.at(&sel.accordion_header, header);
        }
        headers.push((header, node));
    }

    for (i, &(header, node)) in headers.iter().enumerate() {
        let mut actions = vec![Action::AddClass(node, sel.open_class.clone())];
        match headers.get(i + 1) {
            Some(&(inner, _)) => actions.push(Action::Reveal {
                selector: sel.accordion_header.clone(),
                id: inner,
            }),
            None => actions.extend(clip_reveals.iter().cloned()),
        }
        dom.on_click(header, actions);
    }

    (chapter, headers.into_iter().map(|(h, _)| h).collect())
}

/// A classroom page with the given chapters.
pub fn classroom_dom(
    url: &str,
    title: &str,
    body: &str,
    sel: &CurriculumSelectors,
    chapters: &[ChapterSpec],
) -> Dom {
    let mut dom = Dom::new(url, title).body(body);
    for layout in chapters {
        add_chapter(&mut dom, sel, layout);
    }
    dom
}

#[derive(Default)]
struct Shared {
    routes: HashMap<String, Dom>,
    calls: Vec<String>,
    opened: usize,
    closed: usize,
    cookies: Vec<SessionCookie>,
}

/// Browser whose pages load the routed `Dom`s.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    shared: Arc<Mutex<Shared>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigating to `url` loads `dom`.
    pub fn route(&self, url: &str, dom: Dom) {
        self.shared
            .lock()
            .unwrap()
            .routes
            .insert(url.to_string(), dom);
    }

    pub fn calls(&self) -> Vec<String> {
        self.shared.lock().unwrap().calls.clone()
    }

    /// Number of logged calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn opened(&self) -> usize {
        self.shared.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.shared.lock().unwrap().closed
    }

    pub fn cookies(&self) -> Vec<SessionCookie> {
        self.shared.lock().unwrap().cookies.clone()
    }

    pub fn set_cookie_jar(&self, cookies: Vec<SessionCookie>) {
        self.shared.lock().unwrap().cookies = cookies;
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>> {
        self.shared.lock().unwrap().opened += 1;
        Ok(Box::new(FakePage {
            shared: Arc::clone(&self.shared),
            dom: Mutex::new(Dom::new("about:blank", "")),
            closed: AtomicBool::new(false),
        }))
    }

    fn open_pages(&self) -> usize {
        let shared = self.shared.lock().unwrap();
        shared.opened - shared.closed
    }
}

pub struct FakePage {
    shared: Arc<Mutex<Shared>>,
    dom: Mutex<Dom>,
    closed: AtomicBool,
}

impl FakePage {
    fn log(&self, call: String) -> DriverResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Protocol(format!("page closed: {call}")));
        }
        self.shared.lock().unwrap().calls.push(call);
        Ok(())
    }

    fn matches(&self, scope: Option<&ElementRef>, selector: &str) -> Vec<ElementRef> {
        let dom = self.dom.lock().unwrap();
        let ids = match scope {
            None => dom.global.get(selector),
            Some(s) => dom.scoped.get(&(s.0, selector.to_string())),
        };
        ids.map(|ids| ids.iter().map(|&id| ElementRef(id)).collect())
            .unwrap_or_default()
    }
}

fn describe(scope: Option<&ElementRef>, selector: &str) -> String {
    match scope {
        None => format!("query:{selector}"),
        Some(s) => format!("query_in:{}:{selector}", s.0),
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> DriverResult<()> {
        self.log(format!("navigate:{url}"))?;
        let routed = self.shared.lock().unwrap().routes.get(url).cloned();
        match routed {
            Some(dom) => {
                *self.dom.lock().unwrap() = dom;
                Ok(())
            }
            None => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.dom.lock().unwrap().url.clone())
    }

    async fn title(&self) -> DriverResult<String> {
        Ok(self.dom.lock().unwrap().title.clone())
    }

    async fn query(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> DriverResult<Option<ElementRef>> {
        self.log(describe(scope, selector))?;
        Ok(self.matches(scope, selector).into_iter().next())
    }

    async fn query_all(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> DriverResult<Vec<ElementRef>> {
        self.log(describe(scope, selector))?;
        Ok(self.matches(scope, selector))
    }

    async fn closest(
        &self,
        element: &ElementRef,
        selector: &str,
    ) -> DriverResult<Option<ElementRef>> {
        let dom = self.dom.lock().unwrap();
        Ok(dom
            .closest
            .get(&(element.0, selector.to_string()))
            .map(|&id| ElementRef(id)))
    }

    async fn inner_text(&self, element: Option<&ElementRef>) -> DriverResult<String> {
        let dom = self.dom.lock().unwrap();
        match element {
            None => Ok(dom.body.clone()),
            Some(el) => dom
                .nodes
                .get(&el.0)
                .map(|n| n.text.clone())
                .ok_or(DriverError::StaleElement(*el)),
        }
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        let dom = self.dom.lock().unwrap();
        let node = dom
            .nodes
            .get(&element.0)
            .ok_or(DriverError::StaleElement(*element))?;
        Ok(node.attrs.get(name).cloned())
    }

    async fn is_visible(&self, element: &ElementRef) -> DriverResult<bool> {
        let dom = self.dom.lock().unwrap();
        Ok(dom.nodes.get(&element.0).is_some_and(|n| !n.hidden))
    }

    async fn click(&self, element: &ElementRef) -> DriverResult<()> {
        self.log(format!("click:{}", element.0))?;
        let mut dom = self.dom.lock().unwrap();
        let actions = dom
            .on_click
            .get_mut(&element.0)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_default();
        for action in actions {
            dom.apply(action);
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> DriverResult<()> {
        self.log(format!("fill:{}:{value}", element.0))?;
        self.dom.lock().unwrap().attr(element.0, "value", value);
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> DriverResult<()> {
        self.log(format!("scroll_into_view:{}", element.0))
    }

    async fn click_and_follow(
        &self,
        element: &ElementRef,
        _timeout: Duration,
    ) -> DriverResult<Option<String>> {
        self.log(format!("click_and_follow:{}", element.0))?;
        Ok(self.dom.lock().unwrap().follow.get(&element.0).cloned())
    }

    async fn call_on(&self, element: &ElementRef, _function: &str) -> DriverResult<Value> {
        self.log(format!("call_on:{}", element.0))?;
        Ok(Value::Null)
    }

    async fn evaluate(&self, script: &str) -> DriverResult<Value> {
        self.log("evaluate".to_string())?;
        let dom = self.dom.lock().unwrap();
        Ok(dom
            .scripts
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null))
    }

    async fn scroll_height(&self) -> DriverResult<i64> {
        let mut dom = self.dom.lock().unwrap();
        let height = if dom.heights.len() > 1 {
            dom.heights.pop_front()
        } else {
            dom.heights.front().copied()
        };
        Ok(height.unwrap_or(0))
    }

    async fn scroll_to_bottom(&self) -> DriverResult<()> {
        self.log("scroll_to_bottom".to_string())
    }

    async fn scroll_to_top(&self) -> DriverResult<()> {
        self.log("scroll_to_top".to_string())
    }

    async fn go_back(&self) -> DriverResult<()> {
        self.log("go_back".to_string())
    }

    async fn screenshot(&self, path: &Path) -> DriverResult<()> {
        self.log("screenshot".to_string())?;
        std::fs::write(path, b"png").map_err(|e| DriverError::Protocol(e.to_string()))
    }

    async fn cookies(&self) -> DriverResult<Vec<SessionCookie>> {
        Ok(self.shared.lock().unwrap().cookies.clone())
    }

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> DriverResult<()> {
        self.log(format!("set_cookies:{}", cookies.len()))?;
        self.shared.lock().unwrap().cookies = cookies.to_vec();
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.lock().unwrap().closed += 1;
        }
        Ok(())
    }

    async fn wait_for_timeout(&self, duration: Duration) {
        let _ = self.log(format!("wait:{}", duration.as_millis()));
        tokio::time::sleep(duration).await;
    }
}
