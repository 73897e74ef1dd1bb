//! Report assemblers.
//!
//! Each module adds one entry point to [`ReportEngine`](crate::ReportEngine)
//! and keeps the arithmetic in a plain `build` function over already-fetched
//! rows, so the shaping logic can be tested without a store.

pub mod admin_dashboard;
pub mod course_dashboard;
pub mod course_performance;
pub mod enrollment_report;
pub mod learning_progress;
pub mod student_dashboard;

use std::collections::HashMap;

use lectern_core::catalog::{Category, Course, Lesson};
use uuid::Uuid;

/// Label for courses without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Id-keyed views over catalog rows, built once per report.
pub(crate) struct Catalog<'a> {
  pub courses:    HashMap<Uuid, &'a Course>,
  pub categories: HashMap<Uuid, &'a Category>,
  pub lessons:    HashMap<Uuid, &'a Lesson>,
}

impl<'a> Catalog<'a> {
  pub fn new(courses: &'a [Course], categories: &'a [Category], lessons: &'a [Lesson]) -> Self {
    Self {
      courses:    courses.iter().map(|c| (c.id, c)).collect(),
      categories: categories.iter().map(|c| (c.id, c)).collect(),
      lessons:    lessons.iter().map(|l| (l.id, l)).collect(),
    }
  }

  /// The category a course belongs to, or `None` for uncategorized and
  /// unknown courses alike.
  pub fn category_of(&self, course_id: Uuid) -> Option<&'a Category> {
    self
      .courses
      .get(&course_id)
      .and_then(|c| c.category_id)
      .and_then(|id| self.categories.get(&id).copied())
  }

  pub fn category_name(&self, course_id: Uuid) -> Option<String> {
    self.category_of(course_id).map(|c| c.name.clone())
  }

  pub fn course_of_lesson(&self, lesson_id: Uuid) -> Option<Uuid> {
    self.lessons.get(&lesson_id).map(|l| l.course_id)
  }

  pub fn course_title(&self, course_id: Uuid) -> Option<String> {
    self.courses.get(&course_id).map(|c| c.title.clone())
  }
}

/// Who a student-scoped report is about.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StudentInfo {
  pub id:        Uuid,
  pub full_name: Option<String>,
  pub email:     String,
}

impl From<&lectern_core::profile::Profile> for StudentInfo {
  fn from(p: &lectern_core::profile::Profile) -> Self {
    Self { id: p.id, full_name: p.full_name.clone(), email: p.email.clone() }
  }
}
