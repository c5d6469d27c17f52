//! SQLite store for courses, lectures and the crawl log.
//!
//! Each public write runs in its own transaction. The connection sits
//! behind a mutex that is never held across an await.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::types::{
    Course, CourseRef, CrawlLogEntry, CrawlStatus, DriftReport, HarvestError, HarvestResult,
    Lecture, NewLecture,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS courses (
    course_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    progress_percent REAL NOT NULL DEFAULT 0
        CHECK (progress_percent >= 0 AND progress_percent <= 100),
    study_minutes REAL NOT NULL DEFAULT 0 CHECK (study_minutes >= 0),
    total_minutes REAL NOT NULL DEFAULT 0 CHECK (total_minutes >= 0),
    url TEXT NOT NULL,
    display_order INTEGER,
    is_target INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS lectures (
    course_id INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
    section_number INTEGER NOT NULL,
    section_title TEXT NOT NULL,
    lecture_number INTEGER NOT NULL,
    lecture_title TEXT NOT NULL,
    lecture_minutes REAL NOT NULL DEFAULT 0 CHECK (lecture_minutes >= 0),
    is_completed INTEGER NOT NULL DEFAULT 0,
    sort_order INTEGER NOT NULL,
    PRIMARY KEY (course_id, section_number, lecture_number)
);
CREATE INDEX IF NOT EXISTS idx_lectures_sort ON lectures(course_id, sort_order);

CREATE TABLE IF NOT EXISTS crawl_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('success', 'failure')),
    error_message TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_crawl_logs_course ON crawl_logs(course_id, id);

CREATE TRIGGER IF NOT EXISTS crawl_logs_no_update BEFORE UPDATE ON crawl_logs
BEGIN
    SELECT RAISE(ABORT, 'crawl_logs is append-only');
END;
CREATE TRIGGER IF NOT EXISTS crawl_logs_no_delete BEFORE DELETE ON crawl_logs
BEGIN
    SELECT RAISE(ABORT, 'crawl_logs is append-only');
END;
";

const COURSE_COLUMNS: &str = "course_id, title, progress_percent, study_minutes, total_minutes, \
     url, display_order, is_target, updated_at";

/// Which stored courses a run should visit.
#[derive(Debug, Clone, Default, PartialEq)]
///
/// A `course_id` selects that course alone; the other fields apply only
/// when it is unset.
pub struct CourseFilter {
    pub course_id: Option<i64>,
    pub target_only: bool,
    /// Skip courses updated more recently than this.
    pub updated_before: Option<DateTime<Utc>>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    let updated_at: Option<String> = row.get(8)?;
    Ok(Course {
        id: row.get(0)?,
        title: row.get(1)?,
        progress_percent: row.get(2)?,
        study_minutes: row.get(3)?,
        total_minutes: row.get(4)?,
        url: row.get(5)?,
        display_order: row.get(6)?,
        is_target: row.get(7)?,
        updated_at: updated_at.as_deref().and_then(parse_timestamp),
    })
}

fn upsert_course_in(tx: &Transaction<'_>, course: &Course, now: &str) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO courses (course_id, title, progress_percent, study_minutes, total_minutes,
                              url, display_order, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
         ON CONFLICT(course_id) DO UPDATE SET
             title = excluded.title,
             progress_percent = excluded.progress_percent,
             study_minutes = excluded.study_minutes,
             total_minutes = excluded.total_minutes,
             url = excluded.url,
             display_order = COALESCE(excluded.display_order, courses.display_order),
             updated_at = excluded.updated_at",
        params![
            course.id,
            course.title,
            course.progress_percent,
            course.study_minutes,
            course.total_minutes,
            course.url,
            course.display_order,
            now,
        ],
    )?;
    Ok(())
}

fn replace_lectures_in(
    tx: &Transaction<'_>,
    course_id: i64,
    lectures: &[NewLecture],
) -> rusqlite::Result<usize> {
    tx.execute("DELETE FROM lectures WHERE course_id = ?1", params![course_id])?;
    let mut stmt = tx.prepare(
        "INSERT INTO lectures (course_id, section_number, section_title, lecture_number,
                               lecture_title, lecture_minutes, is_completed, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (i, lecture) in lectures.iter().enumerate() {
        stmt.execute(params![
            course_id,
            lecture.section_number,
            lecture.section_title,
            lecture.lecture_number,
            lecture.lecture_title,
            lecture.lecture_minutes,
            lecture.is_completed,
            i as i64 + 1,
        ])?;
    }
    Ok(lectures.len())
}

/// Course/lecture/crawl-log store backed by SQLite.
pub struct CourseStore {
    conn: Mutex<Connection>,
}

impl CourseStore {
    /// Open or create a store at `path`.
    pub fn open(path: &Path) -> HarvestResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> HarvestResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> HarvestResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Insert or update a course by id, overwriting every harvested field.
    /// `is_target` is left alone, and a missing `display_order` keeps the
    /// stored one.
    pub fn upsert_course(&self, course: &Course) -> HarvestResult<()> {
        self.write_harvest(course, None)
    }

    /// Delete every lecture of `course_id` and insert `lectures` with fresh
    /// 1-based sort order, atomically.
    pub fn replace_lectures(&self, course_id: i64, lectures: &[NewLecture]) -> HarvestResult<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let n = replace_lectures_in(&tx, course_id, lectures)?;
        tx.commit()?;
        Ok(n)
    }

    /// Upsert a course and, when given, replace its lectures, in one
    /// transaction.
    pub fn write_harvest(&self, course: &Course, lectures: Option<&[NewLecture]>) -> HarvestResult<()> {
        validate_course(course)?;
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        upsert_course_in(&tx, course, &timestamp(Utc::now()))?;
        if let Some(lectures) = lectures {
            replace_lectures_in(&tx, course.id, lectures)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert placeholder rows for newly discovered courses. Existing rows
    /// only get their URL and display order refreshed. Returns how many rows
    /// were new.
    pub fn register_discovered(&self, refs: &[CourseRef]) -> HarvestResult<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = timestamp(Utc::now());
        let mut inserted = 0;
        {
            let mut insert = tx.prepare(
                "INSERT INTO courses (course_id, title, url, display_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(course_id) DO NOTHING",
            )?;
            let mut refresh = tx.prepare(
                "UPDATE courses SET url = ?2, display_order = COALESCE(?3, display_order)
                 WHERE course_id = ?1",
            )?;
            for r in refs {
                let title = r
                    .title
                    .clone()
                    .unwrap_or_else(|| crate::types::placeholder_title(r.id));
                if insert.execute(params![r.id, title, r.url, r.display_order, now])? > 0 {
                    inserted += 1;
                } else {
                    refresh.execute(params![r.id, r.url, r.display_order])?;
                }
            }
        }
        tx.commit()?;
        debug!(total = refs.len(), inserted, "discovered courses registered");
        Ok(inserted)
    }

    /// Append a crawl-log row.
    pub fn record_attempt(
        &self,
        course_id: i64,
        status: CrawlStatus,
        error_message: Option<&str>,
    ) -> HarvestResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO crawl_logs (course_id, status, error_message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![course_id, status.as_str(), error_message, timestamp(Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete the lectures of every course in `course_ids` in one batch.
    pub fn delete_lectures_for(&self, course_ids: &[i64]) -> HarvestResult<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM lectures WHERE course_id = ?1")?;
            for id in course_ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Courses whose lecture total differs from the declared total by more
    /// than `threshold_ratio` of it, largest difference first. Courses with
    /// no declared total are never reported.
    pub fn drift_report(&self, threshold_ratio: f64) -> HarvestResult<Vec<DriftReport>> {
        if threshold_ratio.is_nan() || threshold_ratio < 0.0 {
            return Err(HarvestError::Config(format!(
                "drift threshold must be non-negative, got {threshold_ratio}"
            )));
        }
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT c.course_id, c.url, c.title, c.display_order, c.total_minutes,
                    COALESCE(SUM(l.lecture_minutes), 0) AS actual
             FROM courses c
             LEFT JOIN lectures l ON l.course_id = c.course_id
             WHERE c.total_minutes > 0
             GROUP BY c.course_id
             HAVING ABS(c.total_minutes - COALESCE(SUM(l.lecture_minutes), 0))
                    > c.total_minutes * ?1
             ORDER BY ABS(c.total_minutes - COALESCE(SUM(l.lecture_minutes), 0)) DESC,
                      c.course_id",
        )?;
        let rows = stmt.query_map(params![threshold_ratio], |row| {
            let total: f64 = row.get(4)?;
            let actual: f64 = row.get(5)?;
            Ok(DriftReport {
                course: CourseRef {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    display_order: row.get(3)?,
                },
                total_minutes: total,
                lecture_minutes: actual,
                difference: (total - actual).abs(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Stored courses matching `filter`, in display order.
    pub fn select_courses(&self, filter: &CourseFilter) -> HarvestResult<Vec<Course>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses
             WHERE (?1 IS NOT NULL AND course_id = ?1)
                OR (?1 IS NULL
                    AND (?2 = 0 OR is_target = 1)
                    AND (?3 IS NULL OR updated_at IS NULL OR updated_at < ?3))
             ORDER BY display_order IS NULL, display_order, course_id"
        ))?;
        let cutoff = filter.updated_before.map(timestamp);
        let rows = stmt.query_map(
            params![filter.course_id, filter.target_only, cutoff],
            course_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_course(&self, course_id: i64) -> HarvestResult<Option<Course>> {
        let conn = self.lock();
        let course = conn
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE course_id = ?1"),
                params![course_id],
                course_from_row,
            )
            .optional()?;
        Ok(course)
    }

    /// Set or clear the target flag. Returns `false` for an unknown course.
    pub fn set_target(&self, course_id: i64, is_target: bool) -> HarvestResult<bool> {
        let conn = self.lock();
        let n = conn.execute(
            "UPDATE courses SET is_target = ?2 WHERE course_id = ?1",
            params![course_id, is_target],
        )?;
        Ok(n > 0)
    }

    /// Lectures of a course in sort order.
    pub fn lectures_for(&self, course_id: i64) -> HarvestResult<Vec<Lecture>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT course_id, section_number, section_title, lecture_number, lecture_title,
                    lecture_minutes, is_completed, sort_order
             FROM lectures WHERE course_id = ?1 ORDER BY sort_order",
        )?;
        let rows = stmt.query_map(params![course_id], |row| {
            Ok(Lecture {
                course_id: row.get(0)?,
                section_number: row.get(1)?,
                section_title: row.get(2)?,
                lecture_number: row.get(3)?,
                lecture_title: row.get(4)?,
                lecture_minutes: row.get(5)?,
                is_completed: row.get(6)?,
                sort_order: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Crawl-log rows, oldest first, optionally for one course.
    pub fn crawl_logs(&self, course_id: Option<i64>) -> HarvestResult<Vec<CrawlLogEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, course_id, status, error_message, created_at FROM crawl_logs
             WHERE (?1 IS NULL OR course_id = ?1) ORDER BY id",
        )?;
        let rows = stmt.query_map(params![course_id], |row| {
            let status: String = row.get(2)?;
            let created_at: String = row.get(4)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                status,
                row.get::<_, Option<String>>(3)?,
                created_at,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, course_id, status, error_message, created_at) = row?;
            let status = CrawlStatus::parse(&status)
                .ok_or_else(|| HarvestError::InvalidData(format!("crawl status {status}")))?;
            let timestamp = parse_timestamp(&created_at)
                .ok_or_else(|| HarvestError::InvalidData(format!("timestamp {created_at}")))?;
            entries.push(CrawlLogEntry {
                id,
                course_id,
                status,
                error_message,
                timestamp,
            });
        }
        Ok(entries)
    }
}

fn validate_course(course: &Course) -> HarvestResult<()> {
    if !(0.0..=100.0).contains(&course.progress_percent) {
        return Err(HarvestError::InvalidData(format!(
            "progress {} out of range for course {}",
            course.progress_percent, course.id
        )));
    }
    if course.study_minutes < 0.0 || course.total_minutes < 0.0 {
        return Err(HarvestError::InvalidData(format!(
            "negative duration for course {}",
            course.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn course(id: i64) -> Course {
        Course {
            id,
            title: format!("Rust course {id}"),
            progress_percent: 40.0,
            study_minutes: 120.5,
            total_minutes: 600.0,
            url: format!("https://fastcampus.co.kr/classroom/{id}"),
            display_order: Some(1),
            is_target: false,
            updated_at: None,
        }
    }

    fn lectures(n: usize, minutes: f64) -> Vec<NewLecture> {
        (0..n)
            .map(|i| NewLecture {
                section_number: 1 + (i / 2) as i64,
                section_title: format!("Part {}", 1 + i / 2),
                lecture_number: 1 + (i % 2) as i64,
                lecture_title: format!("Lecture {i}"),
                lecture_minutes: minutes,
                is_completed: i == 0,
            })
            .collect()
    }

    fn count(store: &CourseStore, sql: &str) -> i64 {
        store.lock().query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = CourseStore::open_in_memory().unwrap();
        let c = course(214390);

        store.upsert_course(&c).unwrap();
        let first = store.get_course(c.id).unwrap().unwrap();
        store.upsert_course(&c).unwrap();
        let second = store.get_course(c.id).unwrap().unwrap();

        assert_eq!(count(&store, "SELECT COUNT(*) FROM courses"), 1);
        assert_eq!(
            Course { updated_at: None, ..first.clone() },
            Course { updated_at: None, ..second.clone() }
        );
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_upsert_overwrites_and_keeps_target_flag() {
        let store = CourseStore::open_in_memory().unwrap();
        let mut c = course(1);
        store.upsert_course(&c).unwrap();
        assert!(store.set_target(1, true).unwrap());

        c.progress_percent = 75.0;
        c.title = "Renamed".into();
        c.display_order = None;
        store.upsert_course(&c).unwrap();

        let stored = store.get_course(1).unwrap().unwrap();
        assert_eq!(stored.progress_percent, 75.0);
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.display_order, Some(1));
        assert!(stored.is_target);
    }

    #[test]
    fn test_replace_lectures_leaves_no_orphans() {
        let store = CourseStore::open_in_memory().unwrap();
        store.upsert_course(&course(7)).unwrap();

        store.replace_lectures(7, &lectures(5, 10.0)).unwrap();
        store.replace_lectures(7, &lectures(3, 12.0)).unwrap();

        let stored = store.lectures_for(7).unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|l| l.lecture_minutes == 12.0));
        assert_eq!(
            stored.iter().map(|l| l.sort_order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_failed_write_rolls_back_whole_course() {
        let store = CourseStore::open_in_memory().unwrap();
        let c = course(9);
        store.write_harvest(&c, Some(&lectures(2, 5.0))).unwrap();

        // A negative lecture duration violates the CHECK constraint mid-insert.
        let mut bad = lectures(3, 8.0);
        bad[2].lecture_minutes = -1.0;
        let changed = Course { title: "Changed".into(), ..c.clone() };
        assert!(store.write_harvest(&changed, Some(&bad)).is_err());

        assert_eq!(store.get_course(9).unwrap().unwrap().title, c.title);
        let kept = store.lectures_for(9).unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|l| l.lecture_minutes == 5.0));
    }

    #[test]
    fn test_out_of_range_progress_rejected() {
        let store = CourseStore::open_in_memory().unwrap();
        let c = Course { progress_percent: 250.0, ..course(3) };
        assert!(matches!(store.upsert_course(&c), Err(HarvestError::InvalidData(_))));
        assert!(store.get_course(3).unwrap().is_none());
    }

    #[test]
    fn test_drift_detection() {
        let store = CourseStore::open_in_memory().unwrap();
        for (id, total, per_lecture) in [(1, 100.0, 21.0), (2, 100.0, 23.0), (3, 0.0, 50.0), (4, 200.0, 10.0)] {
            let c = Course { total_minutes: total, ..course(id) };
            store.write_harvest(&c, Some(&lectures(4, per_lecture))).unwrap();
        }

        let drifted = store.drift_report(0.10).unwrap();
        let ids: Vec<i64> = drifted.iter().map(|d| d.course.id).collect();
        // 4: |200 - 40| = 160, 1: |100 - 84| = 16; 2 (8%) and 3 (no total) excluded.
        assert_eq!(ids, vec![4, 1]);
        assert_eq!(drifted[1].lecture_minutes, 84.0);
        assert_eq!(drifted[1].difference, 16.0);
    }

    #[test]
    fn test_drift_at_threshold_is_not_flagged() {
        let store = CourseStore::open_in_memory().unwrap();
        let exact = Course { total_minutes: 100.0, ..course(6) };
        store.write_harvest(&exact, Some(&lectures(2, 45.0))).unwrap();
        let over = Course { total_minutes: 100.0, ..course(7) };
        store.write_harvest(&over, Some(&lectures(2, 44.75))).unwrap();

        let drifted = store.drift_report(0.10).unwrap();
        let ids: Vec<i64> = drifted.iter().map(|d| d.course.id).collect();
        // 6 misses by exactly 10%; 7 by 10.5%.
        assert_eq!(ids, vec![7]);
    }

    #[test]
    fn test_drift_counts_courses_without_lectures() {
        let store = CourseStore::open_in_memory().unwrap();
        store.upsert_course(&course(5)).unwrap();
        let drifted = store.drift_report(0.10).unwrap();
        assert_eq!(drifted.len(), 1);
        assert_eq!(drifted[0].lecture_minutes, 0.0);
    }

    #[test]
    fn test_crawl_log_is_append_only() {
        let store = CourseStore::open_in_memory().unwrap();
        store.record_attempt(1, CrawlStatus::Success, None).unwrap();
        store
            .record_attempt(1, CrawlStatus::Failure, Some("timeout"))
            .unwrap();

        let logs = store.crawl_logs(Some(1)).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].status, CrawlStatus::Failure);
        assert_eq!(logs[1].error_message.as_deref(), Some("timeout"));

        assert!(store.lock().execute("DELETE FROM crawl_logs", []).is_err());
        assert!(store
            .lock()
            .execute("UPDATE crawl_logs SET status = 'success'", [])
            .is_err());
    }

    #[test]
    fn test_register_discovered_keeps_harvested_fields() {
        let store = CourseStore::open_in_memory().unwrap();
        store.upsert_course(&course(10)).unwrap();

        let refs = vec![
            CourseRef {
                id: 10,
                url: "https://fastcampus.co.kr/classroom/10".into(),
                title: None,
                display_order: Some(2),
            },
            CourseRef {
                id: 11,
                url: "https://fastcampus.co.kr/classroom/11".into(),
                title: None,
                display_order: Some(1),
            },
        ];
        assert_eq!(store.register_discovered(&refs).unwrap(), 1);

        let harvested = store.get_course(10).unwrap().unwrap();
        assert_eq!(harvested.title, "Rust course 10");
        assert_eq!(harvested.display_order, Some(2));

        let placeholder = store.get_course(11).unwrap().unwrap();
        assert_eq!(placeholder.title, "Course 11");
        assert!(placeholder.updated_at.is_none());
    }

    #[test]
    fn test_select_courses_filters() {
        let store = CourseStore::open_in_memory().unwrap();
        for id in [1, 2, 3] {
            store
                .upsert_course(&Course { display_order: Some(4 - id), ..course(id) })
                .unwrap();
        }
        store.set_target(2, true).unwrap();

        let all = store.select_courses(&CourseFilter::default()).unwrap();
        assert_eq!(all.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3, 2, 1]);

        let targets = store
            .select_courses(&CourseFilter { target_only: true, ..Default::default() })
            .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, 2);

        let one = store
            .select_courses(&CourseFilter { course_id: Some(1), ..Default::default() })
            .unwrap();
        assert_eq!(one.len(), 1);

        let stale_only = store
            .select_courses(&CourseFilter {
                updated_before: Some(Utc::now() - chrono::Duration::days(1)),
                ..Default::default()
            })
            .unwrap();
        assert!(stale_only.is_empty());
    }

    #[test]
    fn test_course_id_overrides_other_filters() {
        let store = CourseStore::open_in_memory().unwrap();
        store.upsert_course(&course(1)).unwrap();

        let one = store
            .select_courses(&CourseFilter {
                course_id: Some(1),
                target_only: true,
                updated_before: Some(Utc::now() - chrono::Duration::days(1)),
            })
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id, 1);
    }

    #[test]
    fn test_lectures_require_existing_course() {
        let store = CourseStore::open_in_memory().unwrap();
        assert!(store.replace_lectures(99, &lectures(1, 1.0)).is_err());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("harvest.db");
        {
            let store = CourseStore::open(&path).unwrap();
            store.upsert_course(&course(42)).unwrap();
        }
        let store = CourseStore::open(&path).unwrap();
        assert_eq!(store.get_course(42).unwrap().unwrap().id, 42);
    }
}
