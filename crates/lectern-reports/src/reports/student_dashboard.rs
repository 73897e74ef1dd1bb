//! One student's dashboard.

use std::{cmp::Reverse, collections::BTreeMap};

use chrono::{DateTime, Utc};
use lectern_core::{
  access::Caller,
  catalog::{Category, Course, Lesson},
  enrollment::{Enrollment, EnrollmentStatus, LessonWatchRecord},
  profile::Profile,
  store::{AnalyticsStore, CourseQuery, EnrollmentQuery, LessonQuery, ProgressCalculator, WatchQuery},
  window::{Period, TimeWindow, resolve_period},
};
use lectern_export::BlobStorage;
use serde::Serialize;
use uuid::Uuid;

use super::{Catalog, StudentInfo, UNCATEGORIZED};
use crate::{
  ReportEngine, ReportError,
  aggregate::{farthest_watched, mean, rate, round2, seconds_to_hours, status_counts},
  engine::require_student_access,
  fetch::fetch,
  params::StudentDashboardParams,
};

// ─── Report shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
  pub period:             Period,
  pub window:             TimeWindow,
  pub student:            StudentInfo,
  pub overview:           StudentOverview,
  pub recent_enrollments: Vec<RecentEnrollment>,
  pub recent_lessons:     Vec<RecentLesson>,
  pub categories:         Vec<StudentCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentOverview {
  pub enrolled_courses:  usize,
  pub active_courses:    usize,
  pub completed_courses: usize,
  pub dropped_courses:   usize,
  pub completion_rate:   f64,
  pub lessons_completed: usize,
  pub total_watch_hours: f64,
  /// Mean progress over active and completed enrollments.
  pub avg_progress:      f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentEnrollment {
  pub course_id:        Uuid,
  pub course_title:     String,
  pub status:           EnrollmentStatus,
  pub enrolled_at:      DateTime<Utc>,
  pub progress_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentLesson {
  pub lesson_id:       Uuid,
  pub lesson_title:    String,
  pub course_title:    String,
  pub watched_seconds: u64,
  pub completed:       bool,
  pub last_watched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentCategory {
  pub category_id:     Option<Uuid>,
  pub name:            String,
  pub enrolled:        usize,
  pub completed:       usize,
  pub completion_rate: f64,
  pub watch_hours:     f64,
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

pub(crate) struct Inputs {
  pub student:     Profile,
  pub courses:     Vec<Course>,
  pub categories:  Vec<Category>,
  pub lessons:     Vec<Lesson>,
  pub enrollments: Vec<Enrollment>,
  pub watches:     Vec<LessonWatchRecord>,
  /// Aligned with `enrollments`.
  pub progress:    Vec<f64>,
}

pub(crate) struct Limits {
  pub recent_enrollments: usize,
  pub recent_lessons:     usize,
}

#[derive(Default)]
struct CategoryTally {
  enrolled:  usize,
  completed: usize,
  seconds:   u64,
}

pub(crate) fn build(
  input: Inputs,
  period: Period,
  window: TimeWindow,
  limits: Limits,
) -> StudentDashboard {
  let catalog = Catalog::new(&input.courses, &input.categories, &input.lessons);
  let counts = status_counts(&input.enrollments);
  let summaries = farthest_watched(&input.watches);

  let overview = StudentOverview {
    enrolled_courses:  counts.total,
    active_courses:    counts.active,
    completed_courses: counts.completed,
    dropped_courses:   counts.dropped,
    completion_rate:   counts.completion_rate(),
    lessons_completed: summaries.values().filter(|s| s.completed_at.is_some()).count(),
    total_watch_hours: seconds_to_hours(summaries.values().map(|s| s.watched_seconds).sum()),
    avg_progress:      round2(mean(
      input
        .enrollments
        .iter()
        .zip(&input.progress)
        .filter(|(e, _)| e.status != EnrollmentStatus::Dropped)
        .map(|(_, p)| *p),
    )),
  };

  let mut recent: Vec<(&Enrollment, f64)> =
    input.enrollments.iter().zip(input.progress.iter().copied()).collect();
  recent.sort_by_key(|(e, _)| Reverse(e.enrolled_at));
  let recent_enrollments = recent
    .into_iter()
    .take(limits.recent_enrollments)
    .map(|(e, progress)| RecentEnrollment {
      course_id:        e.course_id,
      course_title:     catalog.course_title(e.course_id).unwrap_or_default(),
      status:           e.status,
      enrolled_at:      e.enrolled_at,
      progress_percent: round2(progress),
    })
    .collect();

  let mut watched: Vec<_> = summaries.values().collect();
  watched.sort_by_key(|s| Reverse(s.last_watched_at));
  let recent_lessons = watched
    .into_iter()
    .filter_map(|s| {
      let lesson = catalog.lessons.get(&s.lesson_id)?;
      Some(RecentLesson {
        lesson_id:       s.lesson_id,
        lesson_title:    lesson.title.clone(),
        course_title:    catalog.course_title(lesson.course_id).unwrap_or_default(),
        watched_seconds: s.watched_seconds,
        completed:       s.completed_at.is_some(),
        last_watched_at: s.last_watched_at,
      })
    })
    .take(limits.recent_lessons)
    .collect();

  let mut tallies: BTreeMap<Option<Uuid>, CategoryTally> = BTreeMap::new();
  for e in &input.enrollments {
    let t = tallies.entry(catalog.category_of(e.course_id).map(|c| c.id)).or_default();
    t.enrolled += 1;
    if e.is_completed() {
      t.completed += 1;
    }
  }
  for s in summaries.values() {
    if let Some(course_id) = catalog.course_of_lesson(s.lesson_id) {
      let key = catalog.category_of(course_id).map(|c| c.id);
      tallies.entry(key).or_default().seconds += s.watched_seconds;
    }
  }
  let category_row = |id: Option<Uuid>, name: String, t: &CategoryTally| StudentCategory {
    category_id: id,
    name,
    enrolled: t.enrolled,
    completed: t.completed,
    completion_rate: rate(t.completed, t.enrolled),
    watch_hours: seconds_to_hours(t.seconds),
  };
  let mut categories: Vec<StudentCategory> = input
    .categories
    .iter()
    .filter_map(|c| tallies.get(&Some(c.id)).map(|t| category_row(Some(c.id), c.name.clone(), t)))
    .collect();
  if let Some(t) = tallies.get(&None) {
    categories.push(category_row(None, UNCATEGORIZED.to_owned(), t));
  }

  StudentDashboard {
    period,
    window,
    student: StudentInfo::from(&input.student),
    overview,
    recent_enrollments,
    recent_lessons,
    categories,
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

impl<S, P, B> ReportEngine<S, P, B>
where
  S: AnalyticsStore,
  P: ProgressCalculator,
  B: BlobStorage,
{
  /// A student's own dashboard. Students may only ask about themselves.
  #[tracing::instrument(skip_all, fields(
    caller = %caller.id,
    student_id = %params.student_id,
    period = %params.period,
  ))]
  pub async fn student_dashboard(
    &self,
    caller: &Caller,
    params: &StudentDashboardParams,
    now: DateTime<Utc>,
  ) -> Result<StudentDashboard, ReportError> {
    require_student_access(caller, params.student_id)?;
    let window = resolve_period(params.period, now);

    let student = fetch("student", self.store.get_profile(params.student_id))
      .await?
      .ok_or(ReportError::NotFound("student"))?;

    let courses_q = CourseQuery::default();
    let lessons_q = LessonQuery::default();
    let enrollments_q = EnrollmentQuery {
      window: Some(window),
      student_id: Some(student.id),
      ..Default::default()
    };
    let watches_q = WatchQuery {
      window: Some(window),
      student_id: Some(student.id),
      ..Default::default()
    };

    let (courses, categories, lessons, enrollments, watches) = tokio::try_join!(
      fetch("courses", self.store.list_courses(&courses_q)),
      fetch("categories", self.store.list_categories()),
      fetch("lessons", self.store.list_lessons(&lessons_q)),
      fetch("enrollments", self.store.list_enrollments(&enrollments_q)),
      fetch("watch records", self.store.list_watch_records(&watches_q)),
    )?;

    let progress = self
      .progress_batch(enrollments.iter().map(|e| (e.student_id, e.course_id)).collect())
      .await;

    Ok(build(
      Inputs { student, courses, categories, lessons, enrollments, watches, progress },
      params.period,
      window,
      Limits {
        recent_enrollments: self.config.recent_enrollments,
        recent_lessons:     self.config.recent_lessons,
      },
    ))
  }
}
