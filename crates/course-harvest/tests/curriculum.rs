//! Accordion expansion and curriculum reading.

mod support;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use course_harvest::config::HarvestConfig;
use course_harvest::driver::BrowserDriver;
use course_harvest::extract::curriculum::expand_accordions;
use course_harvest::extract::{extract_curriculum, to_lectures};
use course_harvest::session::AuthenticatedSession;
use support::{add_chapter, chapter, classroom_dom, clip, ChapterSpec, Dom, FakeBrowser};

const COURSE_URL: &str = "https://fastcampus.co.kr/classroom/214390";

// ─────────────────────── helpers ───────────────────────

fn session(browser: &FakeBrowser) -> AuthenticatedSession {
    AuthenticatedSession::new(
        Arc::new(browser.clone()),
        "https://fastcampus.co.kr/",
        Utc::now(),
    )
}

fn nested(title: &'static str, depth: usize) -> ChapterSpec {
    ChapterSpec {
        depth,
        ..chapter(title, vec![clip("Deep clip", "12:30", false)])
    }
}

fn serve(chapters: &[ChapterSpec]) -> FakeBrowser {
    let config = HarvestConfig::default();
    let browser = FakeBrowser::new();
    browser.route(
        COURSE_URL,
        classroom_dom(COURSE_URL, "강의실", "", &config.profile.curriculum, chapters),
    );
    browser
}

// ─────────────────────── tests ───────────────────────

#[tokio::test(start_paused = true)]
async fn test_reads_sections_in_order() {
    let config = HarvestConfig::default();
    let browser = serve(&[
        chapter(
            "Part 1. 시작하기",
            vec![
                clip("Intro", "5:00", true),
                clip("환경 설정", "12:45", false),
            ],
        ),
        chapter("Part 2. 심화", vec![clip("Ownership", "1:02:30", false)]),
    ]);

    let sections = extract_curriculum(&session(&browser), COURSE_URL, &config)
        .await
        .unwrap();

    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].title, "Part 1. 시작하기");
    assert_eq!(sections[0].lessons.len(), 2);
    assert!(sections[0].lessons[0].is_completed);
    assert!(!sections[0].lessons[1].is_completed);
    assert_eq!(sections[1].lessons[0].duration_text, "1:02:30");

    let lectures = to_lectures(&sections);
    let minutes: Vec<f64> = lectures.iter().map(|l| l.lecture_minutes).collect();
    assert_eq!(minutes, vec![5.0, 12.75, 62.5]);
    assert_eq!(browser.open_pages(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_nested_accordion_opens_on_second_pass() {
    let config = HarvestConfig::default();
    let browser = serve(&[nested("Part 1", 2)]);

    let sections = extract_curriculum(&session(&browser), COURSE_URL, &config)
        .await
        .unwrap();

    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].lessons[0].title, "Deep clip");
}

#[tokio::test(start_paused = true)]
async fn test_expansion_stats_per_pass() {
    let config = HarvestConfig::default();
    let sel = &config.profile.curriculum;
    let mut dom = Dom::new(COURSE_URL, "강의실");
    add_chapter(&mut dom, sel, &nested("Part 1", 2));
    add_chapter(&mut dom, sel, &chapter("Part 2", vec![clip("Flat", "3:00", false)]));

    let browser = FakeBrowser::new();
    browser.route(COURSE_URL, dom);
    let session = session(&browser);
    let page = session.open_page().await.unwrap();
    page.navigate(COURSE_URL, Duration::from_secs(1)).await.unwrap();

    let stats = expand_accordions(&*page, sel, &config.timings).await.unwrap();
    page.release().await;

    assert_eq!(stats.passes, 2);
    assert_eq!(stats.opened, 3);
    assert_eq!(stats.already_open, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.opened_last_pass, 1);
}

#[tokio::test(start_paused = true)]
async fn test_third_level_needs_extra_pass() {
    let config = HarvestConfig::default();
    let browser = serve(&[nested("Part 1", 3)]);

    let sections = extract_curriculum(&session(&browser), COURSE_URL, &config)
        .await
        .unwrap();
    assert!(sections.is_empty());

    let mut deeper = config.clone();
    deeper.timings.accordion_passes = 3;
    let browser = serve(&[nested("Part 1", 3)]);
    let sections = extract_curriculum(&session(&browser), COURSE_URL, &deeper)
        .await
        .unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].lessons.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_header_is_clicked_again() {
    let config = HarvestConfig::default();
    let sel = &config.profile.curriculum;
    let mut dom = Dom::new(COURSE_URL, "강의실");
    let (_, headers) = add_chapter(
        &mut dom,
        sel,
        &chapter("Part 1", vec![clip("Intro", "5:00", false)]),
    );
    dom.ignore_next_click(headers[0]);

    let browser = FakeBrowser::new();
    browser.route(COURSE_URL, dom);

    let sections = extract_curriculum(&session(&browser), COURSE_URL, &config)
        .await
        .unwrap();

    assert_eq!(sections.len(), 1);
    assert_eq!(browser.count(&format!("click:{}", headers[0])), 2);
}

#[tokio::test(start_paused = true)]
async fn test_header_click_waits_for_animation() {
    let config = HarvestConfig::default();
    let browser = serve(&[chapter("Part 1", vec![clip("Intro", "5:00", false)])]);

    extract_curriculum(&session(&browser), COURSE_URL, &config)
        .await
        .unwrap();

    let calls = browser.calls();
    let click = calls.iter().position(|c| c.starts_with("click:")).unwrap();
    assert_eq!(calls[click - 1], "wait:300");
    assert_eq!(calls[click + 1], "wait:800");
    assert!(calls.contains(&"wait:3000".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_section_without_lectures_is_dropped() {
    let config = HarvestConfig::default();
    let browser = serve(&[
        chapter("Part 1", vec![clip("Intro", "5:00", false)]),
        chapter("공지사항", vec![]),
        chapter("Part 2", vec![clip("Wrap-up", "", false)]),
    ]);

    let sections = extract_curriculum(&session(&browser), COURSE_URL, &config)
        .await
        .unwrap();

    let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Part 1", "Part 2"]);

    let lectures = to_lectures(&sections);
    assert_eq!(lectures[1].section_number, 2);
    assert_eq!(lectures[1].lecture_minutes, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_sidebar_yields_nothing() {
    let config = HarvestConfig::default();
    let browser = FakeBrowser::new();
    browser.route(COURSE_URL, Dom::new(COURSE_URL, "강의실"));

    let started = tokio::time::Instant::now();
    let sections = extract_curriculum(&session(&browser), COURSE_URL, &config)
        .await
        .unwrap();

    assert!(sections.is_empty());
    assert!(started.elapsed() >= config.timings.curriculum_wait);
    assert_eq!(browser.count("click:"), 0);
    assert_eq!(browser.open_pages(), 0);
}
