//! The read contracts the engine consumes.
//!
//! [`AnalyticsStore`] is implemented by storage backends (e.g.
//! `lectern-store-sqlite`). Report assemblers depend on this abstraction, not
//! on any concrete backend. Nothing here writes.

use std::future::Future;

use uuid::Uuid;

use crate::{
  catalog::{Category, Course, Lesson},
  enrollment::{Enrollment, EnrollmentStatus, LessonWatchRecord},
  profile::{Profile, Role},
  window::TimeWindow,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`AnalyticsStore::list_courses`].
#[derive(Debug, Clone, Default)]
pub struct CourseQuery {
  pub category_id:    Option<Uuid>,
  pub published_only: bool,
}

/// Parameters for [`AnalyticsStore::list_lessons`].
#[derive(Debug, Clone, Default)]
pub struct LessonQuery {
  pub course_id:      Option<Uuid>,
  pub published_only: bool,
}

/// Parameters for [`AnalyticsStore::list_enrollments`]. All filters are
/// ANDed; `window` applies to `enrolled_at`.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentQuery {
  pub window:      Option<TimeWindow>,
  pub student_id:  Option<Uuid>,
  pub course_id:   Option<Uuid>,
  /// Matches through the enrollment's course.
  pub category_id: Option<Uuid>,
  pub status:      Option<EnrollmentStatus>,
}

/// Parameters for [`AnalyticsStore::list_watch_records`]. All filters are
/// ANDed; `window` applies to `last_watched_at`.
#[derive(Debug, Clone, Default)]
pub struct WatchQuery {
  pub window:     Option<TimeWindow>,
  pub student_id: Option<Uuid>,
  /// Matches through the record's lesson.
  pub course_id:  Option<Uuid>,
  pub lesson_id:  Option<Uuid>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Read-only access to the entity sets reports are computed from.
///
/// List operations return an empty `Vec` when nothing matches. All methods
/// return `Send` futures so the trait can be used in multi-threaded async
/// runtimes (e.g. tokio with `axum`).
pub trait AnalyticsStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// List profiles, optionally restricted to one role.
  fn list_profiles(
    &self,
    role: Option<Role>,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  /// Retrieve a profile by id. Returns `None` if not found.
  fn get_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  // ── Catalog ───────────────────────────────────────────────────────────

  fn list_categories(
    &self,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  fn list_courses<'a>(
    &'a self,
    query: &'a CourseQuery,
  ) -> impl Future<Output = Result<Vec<Course>, Self::Error>> + Send + 'a;

  /// Retrieve a course by id. Returns `None` if not found.
  fn get_course(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;

  /// Lessons ordered by course and then `order_index`.
  fn list_lessons<'a>(
    &'a self,
    query: &'a LessonQuery,
  ) -> impl Future<Output = Result<Vec<Lesson>, Self::Error>> + Send + 'a;

  // ── Activity ──────────────────────────────────────────────────────────

  /// Enrollments in fetch order (`enrolled_at` ascending).
  fn list_enrollments<'a>(
    &'a self,
    query: &'a EnrollmentQuery,
  ) -> impl Future<Output = Result<Vec<Enrollment>, Self::Error>> + Send + 'a;

  /// Watch records in fetch order (`last_watched_at` ascending).
  fn list_watch_records<'a>(
    &'a self,
    query: &'a WatchQuery,
  ) -> impl Future<Output = Result<Vec<LessonWatchRecord>, Self::Error>> + Send + 'a;
}

/// Computes how far a student is through a course, as a percentage.
///
/// Owned by a collaborator; reports treat failures as `0`.
pub trait ProgressCalculator: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn progress_percent(
    &self,
    student_id: Uuid,
    course_id: Uuid,
  ) -> impl Future<Output = Result<f64, Self::Error>> + Send + '_;
}
