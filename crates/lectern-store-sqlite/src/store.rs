//! [`SqliteStore`]: the SQLite implementation of [`AnalyticsStore`].

use std::path::Path;

use chrono::{DateTime, Datelike as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use lectern_core::{
  catalog::{Category, Course, Lesson},
  enrollment::{Enrollment, LessonWatchRecord},
  profile::{Profile, Role},
  store::{
    AnalyticsStore, CourseQuery, EnrollmentQuery, LessonQuery,
    ProgressCalculator, WatchQuery,
  },
  window::TimeWindow,
};

use crate::{
  Result,
  encode::{
    RawCategory, RawCourse, RawEnrollment, RawLesson, RawProfile,
    RawWatchRecord, encode_dt, encode_role, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Row readers ─────────────────────────────────────────────────────────────

const COURSE_COLUMNS: &str =
  "id, title, slug, category_id, is_published, created_at";

fn read_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCourse> {
  Ok(RawCourse {
    id:           row.get(0)?,
    title:        row.get(1)?,
    slug:         row.get(2)?,
    category_id:  row.get(3)?,
    is_published: row.get(4)?,
    created_at:   row.get(5)?,
  })
}

const PROFILE_COLUMNS: &str = "id, full_name, email, role, created_at";

fn read_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfile> {
  Ok(RawProfile {
    id:         row.get(0)?,
    full_name:  row.get(1)?,
    email:      row.get(2)?,
    role:       row.get(3)?,
    created_at: row.get(4)?,
  })
}

/// Timestamps past year 9999 render as `+10000-..` and would sort before
/// every stored value, so bounds are capped at the last four-digit instant.
const LAST_ENCODABLE: &str = "9999-12-31T23:59:59.999999Z";

fn encode_bound(at: DateTime<Utc>) -> String {
  if at.year() > 9999 { LAST_ENCODABLE.to_owned() } else { encode_dt(at) }
}

fn window_bounds(window: Option<TimeWindow>) -> (Option<String>, Option<String>) {
  match window {
    Some(w) => (Some(encode_bound(w.start)), Some(encode_bound(w.end))),
    None => (None, None),
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Lectern analytics store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Seeding ───────────────────────────────────────────────────────────────
  //
  // The engine never writes; these exist for operators and tests that need to
  // populate a store.

  pub async fn insert_category(&self, category: &Category) -> Result<()> {
    let id   = encode_uuid(category.id);
    let name = category.name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO categories (id, name) VALUES (?1, ?2)",
          rusqlite::params![id, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_course(&self, course: &Course) -> Result<()> {
    let id          = encode_uuid(course.id);
    let title       = course.title.clone();
    let slug        = course.slug.clone();
    let category_id = course.category_id.map(encode_uuid);
    let published   = course.is_published;
    let created_at  = encode_dt(course.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO courses (id, title, slug, category_id, is_published, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id, title, slug, category_id, published, created_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_lesson(&self, lesson: &Lesson) -> Result<()> {
    let id        = encode_uuid(lesson.id);
    let course_id = encode_uuid(lesson.course_id);
    let title     = lesson.title.clone();
    let order     = i64::from(lesson.order_index);
    let duration  = lesson.duration_seconds.map(i64::from);
    let published = lesson.is_published;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lessons (id, course_id, title, order_index, duration_seconds, is_published)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id, course_id, title, order, duration, published],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_profile(&self, profile: &Profile) -> Result<()> {
    let id         = encode_uuid(profile.id);
    let full_name  = profile.full_name.clone();
    let email      = profile.email.clone();
    let role       = encode_role(profile.role);
    let created_at = encode_dt(profile.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (id, full_name, email, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id, full_name, email, role, created_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<()> {
    let id           = encode_uuid(enrollment.id);
    let student_id   = encode_uuid(enrollment.student_id);
    let course_id    = encode_uuid(enrollment.course_id);
    let status       = encode_status(enrollment.status);
    let enrolled_at  = encode_dt(enrollment.enrolled_at);
    let completed_at = enrollment.completed_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO enrollments (id, student_id, course_id, status, enrolled_at, completed_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id, student_id, course_id, status, enrolled_at, completed_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_watch_record(&self, record: &LessonWatchRecord) -> Result<()> {
    let id           = encode_uuid(record.id);
    let student_id   = encode_uuid(record.student_id);
    let lesson_id    = encode_uuid(record.lesson_id);
    let watched      = i64::try_from(record.watched_seconds).unwrap_or(i64::MAX);
    let completed_at = record.completed_at.map(encode_dt);
    let last_watched = encode_dt(record.last_watched_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lesson_progress
             (id, student_id, lesson_id, watched_seconds, completed_at, last_watched_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id, student_id, lesson_id, watched, completed_at, last_watched],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── AnalyticsStore impl ─────────────────────────────────────────────────────

impl AnalyticsStore for SqliteStore {
  type Error = crate::Error;

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>> {
    let role_str = role.map(encode_role);

    let raws: Vec<RawProfile> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROFILE_COLUMNS} FROM profiles
           WHERE (?1 IS NULL OR role = ?1)
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![role_str], read_profile)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfile::into_profile).collect()
  }

  async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            rusqlite::params![id_str],
            read_profile,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn list_categories(&self) -> Result<Vec<Category>> {
    let raws: Vec<RawCategory> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name, rowid")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawCategory { id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCategory::into_category).collect()
  }

  async fn list_courses(&self, query: &CourseQuery) -> Result<Vec<Course>> {
    let category_id    = query.category_id.map(encode_uuid);
    let published_only = query.published_only;

    let raws: Vec<RawCourse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COURSE_COLUMNS} FROM courses
           WHERE (?1 IS NULL OR category_id = ?1)
             AND (?2 = 0 OR is_published = 1)
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![category_id, published_only], read_course)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCourse::into_course).collect()
  }

  async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCourse> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"),
            rusqlite::params![id_str],
            read_course,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCourse::into_course).transpose()
  }

  async fn list_lessons(&self, query: &LessonQuery) -> Result<Vec<Lesson>> {
    let course_id      = query.course_id.map(encode_uuid);
    let published_only = query.published_only;

    let raws: Vec<RawLesson> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, course_id, title, order_index, duration_seconds, is_published
           FROM lessons
           WHERE (?1 IS NULL OR course_id = ?1)
             AND (?2 = 0 OR is_published = 1)
           ORDER BY course_id, order_index",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![course_id, published_only], |row| {
            Ok(RawLesson {
              id:               row.get(0)?,
              course_id:        row.get(1)?,
              title:            row.get(2)?,
              order_index:      row.get(3)?,
              duration_seconds: row.get(4)?,
              is_published:     row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLesson::into_lesson).collect()
  }

  // ── Activity ──────────────────────────────────────────────────────────────

  async fn list_enrollments(&self, query: &EnrollmentQuery) -> Result<Vec<Enrollment>> {
    let (since, until) = window_bounds(query.window);
    let student_id     = query.student_id.map(encode_uuid);
    let course_id      = query.course_id.map(encode_uuid);
    let category_id    = query.category_id.map(encode_uuid);
    let status         = query.status.map(encode_status);

    let raws: Vec<RawEnrollment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT e.id, e.student_id, e.course_id, e.status, e.enrolled_at, e.completed_at
           FROM enrollments e
           LEFT JOIN courses c ON c.id = e.course_id
           WHERE (?1 IS NULL OR e.enrolled_at >= ?1)
             AND (?2 IS NULL OR e.enrolled_at <  ?2)
             AND (?3 IS NULL OR e.student_id  =  ?3)
             AND (?4 IS NULL OR e.course_id   =  ?4)
             AND (?5 IS NULL OR c.category_id =  ?5)
             AND (?6 IS NULL OR e.status      =  ?6)
           ORDER BY e.enrolled_at, e.rowid",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![since, until, student_id, course_id, category_id, status],
            |row| {
              Ok(RawEnrollment {
                id:           row.get(0)?,
                student_id:   row.get(1)?,
                course_id:    row.get(2)?,
                status:       row.get(3)?,
                enrolled_at:  row.get(4)?,
                completed_at: row.get(5)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEnrollment::into_enrollment).collect()
  }

  async fn list_watch_records(&self, query: &WatchQuery) -> Result<Vec<LessonWatchRecord>> {
    let (since, until) = window_bounds(query.window);
    let student_id     = query.student_id.map(encode_uuid);
    let course_id      = query.course_id.map(encode_uuid);
    let lesson_id      = query.lesson_id.map(encode_uuid);

    let raws: Vec<RawWatchRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT w.id, w.student_id, w.lesson_id, w.watched_seconds,
                  w.completed_at, w.last_watched_at
           FROM lesson_progress w
           LEFT JOIN lessons l ON l.id = w.lesson_id
           WHERE (?1 IS NULL OR w.last_watched_at >= ?1)
             AND (?2 IS NULL OR w.last_watched_at <  ?2)
             AND (?3 IS NULL OR w.student_id      =  ?3)
             AND (?4 IS NULL OR l.course_id       =  ?4)
             AND (?5 IS NULL OR w.lesson_id       =  ?5)
           ORDER BY w.last_watched_at, w.rowid",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![since, until, student_id, course_id, lesson_id],
            |row| {
              Ok(RawWatchRecord {
                id:              row.get(0)?,
                student_id:      row.get(1)?,
                lesson_id:       row.get(2)?,
                watched_seconds: row.get(3)?,
                completed_at:    row.get(4)?,
                last_watched_at: row.get(5)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawWatchRecord::into_record).collect()
  }
}

// ─── ProgressCalculator impl ─────────────────────────────────────────────────

impl ProgressCalculator for SqliteStore {
  type Error = crate::Error;

  /// Completed published lessons over published lessons, as a percentage
  /// rounded to two decimals. A course without published lessons is at 0.
  async fn progress_percent(&self, student_id: Uuid, course_id: Uuid) -> Result<f64> {
    let student_str = encode_uuid(student_id);
    let course_str  = encode_uuid(course_id);

    let (total, completed): (i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM lessons
               WHERE course_id = ?2 AND is_published = 1),
             (SELECT COUNT(DISTINCT w.lesson_id)
                FROM lesson_progress w
                JOIN lessons l ON l.id = w.lesson_id
               WHERE w.student_id = ?1
                 AND l.course_id = ?2
                 AND l.is_published = 1
                 AND w.completed_at IS NOT NULL)",
          rusqlite::params![student_str, course_str],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
      })
      .await?;

    if total <= 0 {
      return Ok(0.0);
    }
    let percent = completed as f64 / total as f64 * 100.0;
    tracing::trace!(%student_id, %course_id, percent, "computed course progress");
    Ok((percent * 100.0).round() / 100.0)
  }
}
