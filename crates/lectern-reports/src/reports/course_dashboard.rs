//! Single-course dashboard: enrollment health, lesson funnel and, for
//! admins, per-student progress.

use std::{
  cmp::Reverse,
  collections::{BTreeMap, HashMap, HashSet},
};

use chrono::{DateTime, Utc};
use lectern_core::{
  access::Caller,
  catalog::{Category, Course, Lesson},
  enrollment::{Enrollment, EnrollmentStatus, LessonWatchRecord},
  profile::{Profile, Role},
  store::{AnalyticsStore, EnrollmentQuery, LessonQuery, ProgressCalculator, WatchQuery},
  window::{Period, TimeWindow, resolve_period},
};
use lectern_export::BlobStorage;
use serde::Serialize;
use uuid::Uuid;

use crate::{
  ReportEngine, ReportError,
  aggregate::{
    SeriesPoint, StatusCounts, WatchSummary, average_elapsed_days, farthest_watched,
    mean, min_by_strict, percent, round2, seconds_to_hours, series, status_counts,
    total_watched_seconds,
  },
  engine::require_admin,
  fetch::{fetch, fetch_if},
  params::CourseDashboardParams,
};

// ─── Report shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CourseDashboard {
  pub period:                  Period,
  pub window:                  TimeWindow,
  pub course:                  CourseInfo,
  pub overview:                CourseOverview,
  pub lesson_funnel:           Vec<FunnelStep>,
  pub most_challenging_lesson: Option<FunnelStep>,
  pub enrollment_trend:        Vec<SeriesPoint>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub student_progress:        Option<Vec<StudentProgressRow>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseInfo {
  pub id:            Uuid,
  pub title:         String,
  pub slug:          String,
  pub category_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseOverview {
  pub enrollments:         StatusCounts,
  pub completion_rate:     f64,
  pub avg_completion_days: f64,
  pub lesson_count:        usize,
  pub total_watch_hours:   f64,
  pub avg_progress:        f64,
}

/// One published lesson's place in the course funnel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStep {
  pub lesson_id:         Uuid,
  pub title:             String,
  pub order_index:       u32,
  pub viewers:           usize,
  pub completions:       usize,
  /// Completions over enrollments in the window, capped at 100.
  pub completion_rate:   f64,
  /// Share of the previous step's audience that never opened this lesson.
  pub drop_off_rate:     f64,
  /// `None` when the lesson has no known duration.
  pub avg_watch_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProgressRow {
  pub student_id:       Uuid,
  pub full_name:        Option<String>,
  pub email:            Option<String>,
  pub status:           EnrollmentStatus,
  pub enrolled_at:      DateTime<Utc>,
  pub completed_at:     Option<DateTime<Utc>>,
  pub progress_percent: f64,
  pub watched_hours:    f64,
  pub last_activity_at: Option<DateTime<Utc>>,
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

pub(crate) struct Inputs {
  pub course:      Course,
  pub categories:  Vec<Category>,
  /// Published lessons of the course, in `order_index` order.
  pub lessons:     Vec<Lesson>,
  pub enrollments: Vec<Enrollment>,
  pub watches:     Vec<LessonWatchRecord>,
  /// Aligned with `enrollments`.
  pub progress:    Vec<f64>,
  /// Present only when per-student rows were requested.
  pub profiles:    Option<Vec<Profile>>,
}

pub(crate) fn build(input: Inputs, period: Period, window: TimeWindow) -> CourseDashboard {
  let counts = status_counts(&input.enrollments);
  // Watches on unpublished lessons stay out of every section.
  let published: HashSet<Uuid> = input.lessons.iter().map(|l| l.id).collect();
  let summaries =
    farthest_watched(input.watches.iter().filter(|w| published.contains(&w.lesson_id)));

  let category_name = input
    .course
    .category_id
    .and_then(|id| input.categories.iter().find(|c| c.id == id))
    .map(|c| c.name.clone());

  let overview = CourseOverview {
    enrollments:         counts,
    completion_rate:     counts.completion_rate(),
    avg_completion_days: round2(average_elapsed_days(
      input.enrollments.iter().map(|e| (e.enrolled_at, e.completed_at)),
    )),
    lesson_count:        input.lessons.len(),
    total_watch_hours:   seconds_to_hours(total_watched_seconds(summaries.values())),
    avg_progress:        round2(mean(input.progress.iter().copied())),
  };

  let funnel = lesson_funnel(&input.lessons, &summaries, counts.total);
  let watched: Vec<&(FunnelStep, f64)> =
    funnel.iter().filter(|(step, _)| step.viewers > 0).collect();
  let most_challenging_lesson =
    min_by_strict(&watched, |(_, raw)| *raw).map(|(step, _)| step.clone());
  let lesson_funnel = funnel.into_iter().map(|(step, _)| step).collect();

  let enrollment_trend =
    series(&input.enrollments, |e| e.enrolled_at, period.default_granularity());

  let student_progress = input.profiles.as_deref().map(|profiles| {
    student_rows(&input.enrollments, &input.progress, &summaries, profiles)
  });

  CourseDashboard {
    period,
    window,
    course: CourseInfo {
      id: input.course.id,
      title: input.course.title,
      slug: input.course.slug,
      category_name,
    },
    overview,
    lesson_funnel,
    most_challenging_lesson,
    enrollment_trend,
    student_progress,
  }
}

/// Funnel steps paired with their unrounded completion rate.
fn lesson_funnel(
  lessons: &[Lesson],
  summaries: &BTreeMap<(Uuid, Uuid), WatchSummary>,
  enrolled: usize,
) -> Vec<(FunnelStep, f64)> {
  let mut by_lesson: HashMap<Uuid, Vec<&WatchSummary>> = HashMap::new();
  for s in summaries.values() {
    by_lesson.entry(s.lesson_id).or_default().push(s);
  }

  let mut previous = enrolled;
  lessons
    .iter()
    .map(|lesson| {
      let viewers = by_lesson.get(&lesson.id).map(Vec::as_slice).unwrap_or_default();
      let completions = viewers.iter().filter(|s| s.completed_at.is_some()).count();
      let raw_completion = percent(completions, enrolled).min(100.0);
      let lost = previous.saturating_sub(viewers.len());

      let avg_watch_percent = lesson
        .duration_seconds
        .filter(|d| *d > 0)
        .map(|duration| {
          round2(mean(viewers.iter().map(|s| {
            (s.watched_seconds as f64 / f64::from(duration) * 100.0).min(100.0)
          })))
        });

      let step = FunnelStep {
        lesson_id: lesson.id,
        title: lesson.title.clone(),
        order_index: lesson.order_index,
        viewers: viewers.len(),
        completions,
        completion_rate: round2(raw_completion),
        drop_off_rate: round2(percent(lost, previous)),
        avg_watch_percent,
      };
      previous = viewers.len();
      (step, raw_completion)
    })
    .collect()
}

fn student_rows(
  enrollments: &[Enrollment],
  progress: &[f64],
  summaries: &BTreeMap<(Uuid, Uuid), WatchSummary>,
  profiles: &[Profile],
) -> Vec<StudentProgressRow> {
  let profiles: HashMap<Uuid, &Profile> = profiles.iter().map(|p| (p.id, p)).collect();

  let mut rows: Vec<StudentProgressRow> = enrollments
    .iter()
    .zip(progress.iter().copied())
    .map(|(e, progress_percent)| {
      let mine = summaries.values().filter(|s| s.student_id == e.student_id);
      let (seconds, last) = mine.fold((0u64, None), |(sum, last), s| {
        (sum + s.watched_seconds, last.max(Some(s.last_watched_at)))
      });
      let profile = profiles.get(&e.student_id);
      StudentProgressRow {
        student_id: e.student_id,
        full_name: profile.and_then(|p| p.full_name.clone()),
        email: profile.map(|p| p.email.clone()),
        status: e.status,
        enrolled_at: e.enrolled_at,
        completed_at: e.completed_at,
        progress_percent: round2(progress_percent),
        watched_hours: seconds_to_hours(seconds),
        last_activity_at: last,
      }
    })
    .collect();
  rows.sort_by_key(|r| Reverse(r.enrolled_at));
  rows
}

// ─── Entry point ──────────────────────────────────────────────────────────────

impl<S, P, B> ReportEngine<S, P, B>
where
  S: AnalyticsStore,
  P: ProgressCalculator,
  B: BlobStorage,
{
  /// Dashboard for one course.
  ///
  /// Aggregate sections are open to any caller; per-student rows require an
  /// admin and are refused before anything is read.
  #[tracing::instrument(skip_all, fields(
    caller = %caller.id,
    course_id = %params.course_id,
    period = %params.period,
    details = params.include_student_details,
  ))]
  pub async fn course_dashboard(
    &self,
    caller: &Caller,
    params: &CourseDashboardParams,
    now: DateTime<Utc>,
  ) -> Result<CourseDashboard, ReportError> {
    if params.include_student_details {
      require_admin(caller)?;
    }
    let window = resolve_period(params.period, now);

    let course = fetch("course", self.store.get_course(params.course_id))
      .await?
      .ok_or(ReportError::NotFound("course"))?;

    let lessons_q = LessonQuery { course_id: Some(course.id), published_only: true };
    let enrollments_q = EnrollmentQuery {
      window: Some(window),
      course_id: Some(course.id),
      ..Default::default()
    };
    let watches_q = WatchQuery {
      window: Some(window),
      course_id: Some(course.id),
      ..Default::default()
    };

    let (categories, lessons, enrollments, watches, profiles) = tokio::try_join!(
      fetch("categories", self.store.list_categories()),
      fetch("lessons", self.store.list_lessons(&lessons_q)),
      fetch("enrollments", self.store.list_enrollments(&enrollments_q)),
      fetch("watch records", self.store.list_watch_records(&watches_q)),
      fetch_if(
        params.include_student_details,
        "students",
        self.store.list_profiles(Some(Role::Student)),
      ),
    )?;

    let progress = self
      .progress_batch(enrollments.iter().map(|e| (e.student_id, e.course_id)).collect())
      .await;

    tracing::debug!(enrollments = enrollments.len(), lessons = lessons.len(), "assembling course dashboard");
    Ok(build(
      Inputs { course, categories, lessons, enrollments, watches, progress, profiles },
      params.period,
      window,
    ))
  }
}
