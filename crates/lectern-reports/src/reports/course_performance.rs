//! Course performance ranking and improvement hints.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use lectern_core::{
  access::Caller,
  catalog::{Course, Lesson},
  enrollment::{Enrollment, LessonWatchRecord},
  store::{AnalyticsStore, CourseQuery, EnrollmentQuery, LessonQuery, ProgressCalculator, WatchQuery},
  window::{Period, TimeWindow, resolve_period},
};
use lectern_export::BlobStorage;
use serde::Serialize;
use strum::Display;
use uuid::Uuid;

use crate::{
  ReportEngine, ReportError,
  aggregate::{
    farthest_watched, hours, max_by_strict, mean, min_by_strict, percent, rate, round2,
    seconds_to_hours, top_n_by,
  },
  engine::require_admin,
  fetch::fetch,
  params::CoursePerformanceParams,
};

/// Completion rate below which a course is flagged.
const LOW_COMPLETION: f64 = 50.0;
/// Completion rate below which a flag is high priority.
const CRITICAL_COMPLETION: f64 = 30.0;
/// Enrollment count below which a course is flagged.
const LOW_ENROLLMENT: usize = 10;

// ─── Report shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CoursePerformance {
  pub period:                    Period,
  pub window:                    TimeWindow,
  pub summary:                   PerformanceSummary,
  /// Every course in scope, by title.
  pub courses:                   Vec<CourseScore>,
  pub top_performers:            Vec<CourseScore>,
  pub top_course:                Option<CourseScore>,
  pub lowest_course:             Option<CourseScore>,
  pub improvement_opportunities: Vec<Improvement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
  pub total_courses:        usize,
  pub total_enrollments:    usize,
  pub avg_completion_rate:  f64,
  pub avg_engagement_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseScore {
  pub course_id:         Uuid,
  pub title:             String,
  pub slug:              String,
  pub enrollment_count:  usize,
  pub completed_count:   usize,
  pub completion_rate:   f64,
  pub total_watch_hours: f64,
  /// Watch hours of this window's enrollees, per enrollee.
  pub avg_watch_hours:   f64,
  pub engagement_score:  f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
  High,
  Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Improvement {
  pub course_id:        Uuid,
  pub title:            String,
  pub completion_rate:  f64,
  pub enrollment_count: usize,
  pub priority:         Priority,
  pub reasons:          Vec<String>,
}

// ─── Scoring ──────────────────────────────────────────────────────────────────

/// `min(100, completion × 0.6 + avg hours × 10 + min(40, enrollments))`,
/// from unrounded inputs.
pub fn engagement_score(completion_rate: f64, avg_watch_hours: f64, enrollments: usize) -> f64 {
  let reach = enrollments.min(40) as f64;
  (completion_rate * 0.6 + avg_watch_hours * 10.0 + reach).min(100.0)
}

/// A course row plus the unrounded values it was rounded from.
struct Scored {
  row:        CourseScore,
  completion: f64,
  engagement: f64,
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

pub(crate) struct Inputs {
  pub courses:     Vec<Course>,
  pub lessons:     Vec<Lesson>,
  pub enrollments: Vec<Enrollment>,
  pub watches:     Vec<LessonWatchRecord>,
}

pub(crate) fn build(
  input: Inputs,
  period: Period,
  window: TimeWindow,
  limit: usize,
) -> CoursePerformance {
  let lesson_course: HashMap<Uuid, Uuid> =
    input.lessons.iter().map(|l| (l.id, l.course_id)).collect();

  // Watch time only counts toward a course for students enrolled in the window.
  let cohort: HashSet<(Uuid, Uuid)> =
    input.enrollments.iter().map(|e| (e.student_id, e.course_id)).collect();

  let mut tallies: HashMap<Uuid, (usize, usize, u64)> = HashMap::new();
  for e in &input.enrollments {
    let t = tallies.entry(e.course_id).or_default();
    t.0 += 1;
    if e.is_completed() {
      t.1 += 1;
    }
  }
  for s in farthest_watched(&input.watches).values() {
    if let Some(&course_id) = lesson_course.get(&s.lesson_id)
      && cohort.contains(&(s.student_id, course_id))
    {
      tallies.entry(course_id).or_default().2 += s.watched_seconds;
    }
  }

  let mut scored: Vec<Scored> = input
    .courses
    .iter()
    .map(|course| {
      let (enrolled, completed, seconds) = tallies.get(&course.id).copied().unwrap_or_default();
      let completion = percent(completed, enrolled);
      let avg_hours = if enrolled == 0 { 0.0 } else { hours(seconds) / enrolled as f64 };
      let engagement = engagement_score(completion, avg_hours, enrolled);
      Scored {
        row: CourseScore {
          course_id:         course.id,
          title:             course.title.clone(),
          slug:              course.slug.clone(),
          enrollment_count:  enrolled,
          completed_count:   completed,
          completion_rate:   round2(completion),
          total_watch_hours: seconds_to_hours(seconds),
          avg_watch_hours:   round2(avg_hours),
          engagement_score:  round2(engagement),
        },
        completion,
        engagement,
      }
    })
    .collect();
  scored.sort_by(|a, b| a.row.title.cmp(&b.row.title));

  let total_enrollments: usize = scored.iter().map(|s| s.row.enrollment_count).sum();
  let total_completed: usize = scored.iter().map(|s| s.row.completed_count).sum();
  let summary = PerformanceSummary {
    total_courses: scored.len(),
    total_enrollments,
    avg_completion_rate: rate(total_completed, total_enrollments),
    avg_engagement_score: round2(mean(scored.iter().map(|s| s.engagement))),
  };

  let top_course = max_by_strict(&scored, |s| s.engagement).map(|s| s.row.clone());
  let lowest_course = min_by_strict(&scored, |s| s.engagement).map(|s| s.row.clone());

  let improvement_opportunities = scored
    .iter()
    .filter_map(|s| {
      let mut reasons = Vec::new();
      if s.completion < LOW_COMPLETION {
        reasons.push(format!("completion rate below {LOW_COMPLETION}%"));
      }
      if s.row.enrollment_count < LOW_ENROLLMENT {
        reasons.push(format!("fewer than {LOW_ENROLLMENT} enrollments"));
      }
      if reasons.is_empty() {
        return None;
      }
      let priority =
        if s.completion < CRITICAL_COMPLETION { Priority::High } else { Priority::Medium };
      Some(Improvement {
        course_id: s.row.course_id,
        title: s.row.title.clone(),
        completion_rate: s.row.completion_rate,
        enrollment_count: s.row.enrollment_count,
        priority,
        reasons,
      })
    })
    .collect();

  let courses: Vec<CourseScore> = scored.iter().map(|s| s.row.clone()).collect();
  let top_performers = top_n_by(scored, |s| s.engagement, limit)
    .into_iter()
    .map(|s| s.row)
    .collect();

  CoursePerformance {
    period,
    window,
    summary,
    courses,
    top_performers,
    top_course,
    lowest_course,
    improvement_opportunities,
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

impl<S, P, B> ReportEngine<S, P, B>
where
  S: AnalyticsStore,
  P: ProgressCalculator,
  B: BlobStorage,
{
  /// Scores every course in scope. Admins only.
  #[tracing::instrument(skip_all, fields(
    caller = %caller.id,
    period = %params.period,
    category_id = ?params.category_id,
  ))]
  pub async fn course_performance(
    &self,
    caller: &Caller,
    params: &CoursePerformanceParams,
    now: DateTime<Utc>,
  ) -> Result<CoursePerformance, ReportError> {
    require_admin(caller)?;
    let limit = params.limit()?;
    let window = resolve_period(params.period, now);

    let courses_q = CourseQuery { category_id: params.category_id, published_only: false };
    let lessons_q = LessonQuery::default();
    let enrollments_q = EnrollmentQuery {
      window: Some(window),
      category_id: params.category_id,
      ..Default::default()
    };
    let watches_q = WatchQuery { window: Some(window), ..Default::default() };

    let (courses, lessons, enrollments, watches) = tokio::try_join!(
      fetch("courses", self.store.list_courses(&courses_q)),
      fetch("lessons", self.store.list_lessons(&lessons_q)),
      fetch("enrollments", self.store.list_enrollments(&enrollments_q)),
      fetch("watch records", self.store.list_watch_records(&watches_q)),
    )?;

    tracing::debug!(courses = courses.len(), "scoring courses");
    Ok(build(Inputs { courses, lessons, enrollments, watches }, params.period, window, limit))
  }
}
