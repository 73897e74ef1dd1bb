//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with
//! microsecond precision, which keeps lexicographic and chronological order
//! identical. Enums are stored as their lowercase names. UUIDs are stored as
//! hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use lectern_core::{
  catalog::{Category, Course, Lesson},
  enrollment::{Enrollment, EnrollmentStatus, LessonWatchRecord},
  profile::{Profile, Role},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    Error::Core(lectern_core::Error::UnknownVariant {
      kind,
      value: s.to_owned(),
    })
  })
}

pub fn encode_status(s: EnrollmentStatus) -> String { s.to_string() }

pub fn decode_status(s: &str) -> Result<EnrollmentStatus> {
  decode_enum("enrollment status", s)
}

pub fn encode_role(r: Role) -> String { r.to_string() }

pub fn decode_role(s: &str) -> Result<Role> { decode_enum("role", s) }

// ─── Integers ─────────────────────────────────────────────────────────────────

fn decode_non_negative(column: &'static str, value: i64) -> Result<u64> {
  u64::try_from(value).map_err(|_| Error::Corrupt { column, value })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `categories` row.
pub struct RawCategory {
  pub id:   String,
  pub name: String,
}

impl RawCategory {
  pub fn into_category(self) -> Result<Category> {
    Ok(Category { id: decode_uuid(&self.id)?, name: self.name })
  }
}

/// Raw values read directly from a `courses` row.
pub struct RawCourse {
  pub id:           String,
  pub title:        String,
  pub slug:         String,
  pub category_id:  Option<String>,
  pub is_published: bool,
  pub created_at:   String,
}

impl RawCourse {
  pub fn into_course(self) -> Result<Course> {
    Ok(Course {
      id:           decode_uuid(&self.id)?,
      title:        self.title,
      slug:         self.slug,
      category_id:  self.category_id.as_deref().map(decode_uuid).transpose()?,
      is_published: self.is_published,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `lessons` row.
pub struct RawLesson {
  pub id:               String,
  pub course_id:        String,
  pub title:            String,
  pub order_index:      i64,
  pub duration_seconds: Option<i64>,
  pub is_published:     bool,
}

impl RawLesson {
  pub fn into_lesson(self) -> Result<Lesson> {
    let order_index = u32::try_from(self.order_index).map_err(|_| Error::Corrupt {
      column: "lessons.order_index",
      value:  self.order_index,
    })?;
    let duration_seconds = self
      .duration_seconds
      .map(|d| {
        u32::try_from(d).map_err(|_| Error::Corrupt {
          column: "lessons.duration_seconds",
          value:  d,
        })
      })
      .transpose()?;

    Ok(Lesson {
      id: decode_uuid(&self.id)?,
      course_id: decode_uuid(&self.course_id)?,
      title: self.title,
      order_index,
      duration_seconds,
      is_published: self.is_published,
    })
  }
}

/// Raw values read directly from a `profiles` row.
pub struct RawProfile {
  pub id:         String,
  pub full_name:  Option<String>,
  pub email:      String,
  pub role:       String,
  pub created_at: String,
}

impl RawProfile {
  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      id:         decode_uuid(&self.id)?,
      full_name:  self.full_name,
      email:      self.email,
      role:       decode_role(&self.role)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `enrollments` row.
pub struct RawEnrollment {
  pub id:           String,
  pub student_id:   String,
  pub course_id:    String,
  pub status:       String,
  pub enrolled_at:  String,
  pub completed_at: Option<String>,
}

impl RawEnrollment {
  pub fn into_enrollment(self) -> Result<Enrollment> {
    Ok(Enrollment {
      id:           decode_uuid(&self.id)?,
      student_id:   decode_uuid(&self.student_id)?,
      course_id:    decode_uuid(&self.course_id)?,
      status:       decode_status(&self.status)?,
      enrolled_at:  decode_dt(&self.enrolled_at)?,
      completed_at: self.completed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw values read directly from a `lesson_progress` row.
pub struct RawWatchRecord {
  pub id:              String,
  pub student_id:      String,
  pub lesson_id:       String,
  pub watched_seconds: i64,
  pub completed_at:    Option<String>,
  pub last_watched_at: String,
}

impl RawWatchRecord {
  pub fn into_record(self) -> Result<LessonWatchRecord> {
    Ok(LessonWatchRecord {
      id:              decode_uuid(&self.id)?,
      student_id:      decode_uuid(&self.student_id)?,
      lesson_id:       decode_uuid(&self.lesson_id)?,
      watched_seconds: decode_non_negative(
        "lesson_progress.watched_seconds",
        self.watched_seconds,
      )?,
      completed_at:    self.completed_at.as_deref().map(decode_dt).transpose()?,
      last_watched_at: decode_dt(&self.last_watched_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexicographically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::TimeDelta::milliseconds(500);
    let c = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert!(ea < eb && eb < ec, "{ea} {eb} {ec}");
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn unknown_status_is_rejected() {
    assert!(matches!(
      decode_status("paused"),
      Err(Error::Core(lectern_core::Error::UnknownVariant { .. }))
    ));
    assert_eq!(decode_status("dropped").unwrap(), EnrollmentStatus::Dropped);
  }

  #[test]
  fn negative_watch_time_is_corrupt() {
    assert!(matches!(
      decode_non_negative("x", -1),
      Err(Error::Corrupt { value: -1, .. })
    ));
  }
}
