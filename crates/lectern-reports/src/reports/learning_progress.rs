//! Per-course learning progress for one student.

use std::{
  cmp::Reverse,
  collections::{BTreeMap, HashMap},
};

use chrono::{DateTime, Utc};
use lectern_core::{
  access::Caller,
  catalog::{Category, Course, Lesson},
  enrollment::{Enrollment, EnrollmentStatus, LessonWatchRecord},
  profile::Profile,
  store::{AnalyticsStore, CourseQuery, EnrollmentQuery, LessonQuery, ProgressCalculator, WatchQuery},
  window::{Granularity, Period, TimeWindow, resolve_period},
};
use lectern_export::BlobStorage;
use serde::Serialize;
use strum::Display;
use uuid::Uuid;

use super::{Catalog, StudentInfo};
use crate::{
  ReportEngine, ReportError,
  aggregate::{
    SeriesPoint, WatchSummary, farthest_watched, mean, round2, seconds_to_hours, series,
    status_counts, total_watched_seconds,
  },
  engine::require_student_access,
  fetch::fetch,
  params::LearningProgressParams,
};

// ─── Report shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LearningProgress {
  pub period:              Period,
  pub window:              TimeWindow,
  pub student:             StudentInfo,
  pub summary:             ProgressSummary,
  pub courses:             Vec<CourseProgress>,
  pub recent_achievements: Vec<Achievement>,
  /// Lesson completions per week.
  pub weekly_activity:     Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
  pub total_courses:       usize,
  pub completed_courses:   usize,
  pub in_progress_courses: usize,
  pub dropped_courses:     usize,
  pub overall_progress:    f64,
  pub lessons_completed:   usize,
  pub total_watch_hours:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
  pub student_id:        Uuid,
  pub course_id:         Uuid,
  pub title:             String,
  pub slug:              String,
  pub status:            EnrollmentStatus,
  pub enrolled_at:       DateTime<Utc>,
  pub completed_at:      Option<DateTime<Utc>>,
  pub progress_percent:  f64,
  pub lessons_completed: usize,
  /// Published lessons in the course.
  pub total_lessons:     usize,
  pub watched_hours:     f64,
  pub last_watched_at:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AchievementKind {
  LessonCompleted,
  CourseCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Achievement {
  pub kind:         AchievementKind,
  /// Lesson title for lesson completions, course title for course ones.
  pub title:        String,
  pub course_id:    Uuid,
  pub course_title: String,
  pub achieved_at:  DateTime<Utc>,
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

pub(crate) struct Inputs {
  pub student:     Profile,
  pub courses:     Vec<Course>,
  pub categories:  Vec<Category>,
  /// Every lesson of the courses in scope, published or not.
  pub lessons:     Vec<Lesson>,
  pub enrollments: Vec<Enrollment>,
  pub watches:     Vec<LessonWatchRecord>,
  /// Aligned with `enrollments`.
  pub progress:    Vec<f64>,
}

/// One row per enrollment, newest first. Works across students, so exports
/// can reuse it for a whole cohort.
pub(crate) fn course_rows(
  catalog: &Catalog<'_>,
  enrollments: &[Enrollment],
  progress: &[f64],
  summaries: &BTreeMap<(Uuid, Uuid), WatchSummary>,
) -> Vec<CourseProgress> {
  let mut published: HashMap<Uuid, usize> = HashMap::new();
  for lesson in catalog.lessons.values().filter(|l| l.is_published) {
    *published.entry(lesson.course_id).or_default() += 1;
  }

  let mut rows: Vec<CourseProgress> = enrollments
    .iter()
    .zip(progress.iter().copied())
    .filter_map(|(e, progress_percent)| {
      let course = catalog.courses.get(&e.course_id)?;
      let in_course: Vec<&WatchSummary> = summaries
        .range((e.student_id, Uuid::nil())..=(e.student_id, Uuid::from_u128(u128::MAX)))
        .map(|(_, s)| s)
        .filter(|s| catalog.course_of_lesson(s.lesson_id) == Some(e.course_id))
        .collect();
      let lessons_completed = in_course
        .iter()
        .filter(|s| {
          s.completed_at.is_some()
            && catalog.lessons.get(&s.lesson_id).is_some_and(|l| l.is_published)
        })
        .count();

      Some(CourseProgress {
        student_id: e.student_id,
        course_id: e.course_id,
        title: course.title.clone(),
        slug: course.slug.clone(),
        status: e.status,
        enrolled_at: e.enrolled_at,
        completed_at: e.completed_at,
        progress_percent: round2(progress_percent),
        lessons_completed,
        total_lessons: published.get(&e.course_id).copied().unwrap_or(0),
        watched_hours: seconds_to_hours(total_watched_seconds(in_course.iter().copied())),
        last_watched_at: in_course.iter().map(|s| s.last_watched_at).max(),
      })
    })
    .collect();
  rows.sort_by_key(|r| Reverse(r.enrolled_at));
  rows
}

pub(crate) fn build(
  input: Inputs,
  period: Period,
  window: TimeWindow,
  achievements: usize,
) -> LearningProgress {
  let catalog = Catalog::new(&input.courses, &input.categories, &input.lessons);
  let counts = status_counts(&input.enrollments);
  let summaries = farthest_watched(&input.watches);

  let courses = course_rows(&catalog, &input.enrollments, &input.progress, &summaries);

  let summary = ProgressSummary {
    total_courses:       counts.total,
    completed_courses:   counts.completed,
    in_progress_courses: counts.active,
    dropped_courses:     counts.dropped,
    overall_progress:    round2(mean(input.progress.iter().copied())),
    lessons_completed:   summaries.values().filter(|s| s.completed_at.is_some()).count(),
    total_watch_hours:   seconds_to_hours(total_watched_seconds(summaries.values())),
  };

  let lesson_wins = summaries.values().filter_map(|s| {
    let completed_at = s.completed_at?;
    let lesson = catalog.lessons.get(&s.lesson_id)?;
    Some(Achievement {
      kind:         AchievementKind::LessonCompleted,
      title:        lesson.title.clone(),
      course_id:    lesson.course_id,
      course_title: catalog.course_title(lesson.course_id).unwrap_or_default(),
      achieved_at:  completed_at,
    })
  });
  let course_wins = input.enrollments.iter().filter_map(|e| {
    let completed_at = e.completed_at?;
    let title = catalog.course_title(e.course_id)?;
    Some(Achievement {
      kind:         AchievementKind::CourseCompleted,
      title:        title.clone(),
      course_id:    e.course_id,
      course_title: title,
      achieved_at:  completed_at,
    })
  });
  let mut recent_achievements: Vec<Achievement> = lesson_wins.chain(course_wins).collect();
  recent_achievements.sort_by_key(|a| Reverse(a.achieved_at));
  recent_achievements.truncate(achievements);

  let completions: Vec<DateTime<Utc>> =
    summaries.values().filter_map(|s| s.completed_at).collect();
  let weekly_activity = series(completions, |at| *at, Granularity::Week);

  LearningProgress {
    period,
    window,
    student: StudentInfo::from(&input.student),
    summary,
    courses,
    recent_achievements,
    weekly_activity,
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

impl<S, P, B> ReportEngine<S, P, B>
where
  S: AnalyticsStore,
  P: ProgressCalculator,
  B: BlobStorage,
{
  /// Course-by-course progress for a student, optionally narrowed to one
  /// course. Covers all time unless a period is given.
  ///
  /// The access check runs before any lookup, so a student probing another
  /// id learns nothing about whether it exists.
  #[tracing::instrument(skip_all, fields(
    caller = %caller.id,
    student_id = %params.student_id,
    course_id = ?params.course_id,
  ))]
  pub async fn learning_progress(
    &self,
    caller: &Caller,
    params: &LearningProgressParams,
    now: DateTime<Utc>,
  ) -> Result<LearningProgress, ReportError> {
    require_student_access(caller, params.student_id)?;
    let period = params.period.unwrap_or(Period::All);
    let window = resolve_period(period, now);

    let student = fetch("student", self.store.get_profile(params.student_id))
      .await?
      .ok_or(ReportError::NotFound("student"))?;
    if let Some(course_id) = params.course_id {
      fetch("course", self.store.get_course(course_id))
        .await?
        .ok_or(ReportError::NotFound("course"))?;
    }

    let courses_q = CourseQuery::default();
    let lessons_q = LessonQuery { course_id: params.course_id, published_only: false };
    let enrollments_q = EnrollmentQuery {
      window: Some(window),
      student_id: Some(student.id),
      course_id: params.course_id,
      ..Default::default()
    };
    let watches_q = WatchQuery {
      window: Some(window),
      student_id: Some(student.id),
      course_id: params.course_id,
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
      period,
      window,
      self.config.achievements,
    ))
  }
}
