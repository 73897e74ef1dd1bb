//! Enrollment and lesson-watch records, the raw material of every report.
//!
//! Neither type is ever written by the engine. Watch records hold the
//! furthest-reached playback position, not cumulative play time, so several
//! records for the same (student, lesson) pair must be reduced with `max`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

// ─── Enrollment ──────────────────────────────────────────────────────────────

/// Lifecycle status of an enrollment.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnrollmentStatus {
  Active,
  Completed,
  Dropped,
}

/// A (student, course) registration.
///
/// `completed_at` is set iff `status` is [`EnrollmentStatus::Completed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
  pub id:           Uuid,
  pub student_id:   Uuid,
  pub course_id:    Uuid,
  pub status:       EnrollmentStatus,
  pub enrolled_at:  DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
  pub fn is_completed(&self) -> bool {
    self.status == EnrollmentStatus::Completed
  }
}

// ─── Watch records ───────────────────────────────────────────────────────────

/// The furthest point one student reached in one lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonWatchRecord {
  pub id:              Uuid,
  pub student_id:      Uuid,
  pub lesson_id:       Uuid,
  pub watched_seconds: u64,
  pub completed_at:    Option<DateTime<Utc>>,
  pub last_watched_at: DateTime<Utc>,
}

impl LessonWatchRecord {
  pub fn is_completed(&self) -> bool { self.completed_at.is_some() }
}
