//! Platform-wide dashboard for administrators.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use lectern_core::{
  access::Caller,
  catalog::{Category, Course, Lesson},
  enrollment::{Enrollment, LessonWatchRecord},
  profile::{Profile, Role},
  store::{AnalyticsStore, CourseQuery, EnrollmentQuery, LessonQuery, ProgressCalculator, WatchQuery},
  window::{Period, TimeWindow, resolve_period},
};
use lectern_export::BlobStorage;
use serde::Serialize;
use uuid::Uuid;

use super::{Catalog, UNCATEGORIZED};
use crate::{
  ReportEngine, ReportError,
  aggregate::{
    SeriesPoint, farthest_watched, rate, seconds_to_hours, series, status_counts,
    top_n_by, total_watched_seconds,
  },
  engine::require_admin,
  fetch::fetch,
  params::AdminDashboardParams,
};

// ─── Report shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
  pub period:           Period,
  pub window:           TimeWindow,
  pub overview:         AdminOverview,
  pub top_courses:      Vec<TopCourse>,
  pub categories:       Vec<CategoryStats>,
  pub enrollment_trend: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminOverview {
  pub total_students:        usize,
  pub new_students:          usize,
  pub total_courses:         usize,
  pub published_courses:     usize,
  pub new_courses:           usize,
  pub total_lessons:         usize,
  pub total_enrollments:     usize,
  pub active_enrollments:    usize,
  pub completed_enrollments: usize,
  pub dropped_enrollments:   usize,
  pub completion_rate:       f64,
  pub active_learners:       usize,
  pub total_watch_hours:     f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCourse {
  pub course_id:        Uuid,
  pub title:            String,
  pub slug:             String,
  pub enrollment_count: usize,
  pub completion_rate:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
  /// `None` for the uncategorized bucket.
  pub category_id:      Option<Uuid>,
  pub name:             String,
  pub course_count:     usize,
  pub enrollment_count: usize,
  pub completed_count:  usize,
  pub completion_rate:  f64,
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

pub(crate) struct Inputs {
  pub students:    Vec<Profile>,
  pub courses:     Vec<Course>,
  pub categories:  Vec<Category>,
  pub lessons:     Vec<Lesson>,
  pub enrollments: Vec<Enrollment>,
  pub watches:     Vec<LessonWatchRecord>,
}

#[derive(Default, Clone, Copy)]
struct Tally {
  enrolled:  usize,
  completed: usize,
}

pub(crate) fn build(
  input: Inputs,
  period: Period,
  window: TimeWindow,
  top_courses: usize,
) -> AdminDashboard {
  let catalog = Catalog::new(&input.courses, &input.categories, &input.lessons);
  let counts = status_counts(&input.enrollments);
  let summaries = farthest_watched(&input.watches);

  let overview = AdminOverview {
    total_students:        input.students.len(),
    new_students:          input.students.iter().filter(|p| window.contains(p.created_at)).count(),
    total_courses:         input.courses.len(),
    published_courses:     input.courses.iter().filter(|c| c.is_published).count(),
    new_courses:           input.courses.iter().filter(|c| window.contains(c.created_at)).count(),
    total_lessons:         input.lessons.len(),
    total_enrollments:     counts.total,
    active_enrollments:    counts.active,
    completed_enrollments: counts.completed,
    dropped_enrollments:   counts.dropped,
    completion_rate:       counts.completion_rate(),
    active_learners:       input.watches.iter().map(|w| w.student_id).collect::<HashSet<_>>().len(),
    total_watch_hours:     seconds_to_hours(total_watched_seconds(summaries.values())),
  };

  let mut per_course: HashMap<Uuid, Tally> = HashMap::new();
  for e in &input.enrollments {
    let t = per_course.entry(e.course_id).or_default();
    t.enrolled += 1;
    if e.is_completed() {
      t.completed += 1;
    }
  }
  let tally = |course_id: Uuid| per_course.get(&course_id).copied().unwrap_or_default();

  // Courses without enrollments sort after ranked ones and only fill
  // remaining slots, because the ranking sort is stable.
  let leaderboard: Vec<TopCourse> = input
    .courses
    .iter()
    .map(|c| {
      let t = tally(c.id);
      TopCourse {
        course_id:        c.id,
        title:            c.title.clone(),
        slug:             c.slug.clone(),
        enrollment_count: t.enrolled,
        completion_rate:  rate(t.completed, t.enrolled),
      }
    })
    .collect();
  let top_courses = top_n_by(leaderboard, |c| c.enrollment_count, top_courses);

  let mut buckets: Vec<(Option<&Category>, usize, Tally)> = input
    .categories
    .iter()
    .map(|c| (Some(c), 0, Tally::default()))
    .collect();
  let mut uncategorized: Option<(usize, Tally)> = None;
  for course in &input.courses {
    let t = tally(course.id);
    let slot = match catalog.category_of(course.id) {
      Some(category) => buckets
        .iter_mut()
        .find(|(c, ..)| c.is_some_and(|c| c.id == category.id))
        .map(|(_, n, sum)| (n, sum)),
      None => {
        let (n, sum) = uncategorized.get_or_insert((0, Tally::default()));
        Some((n, sum))
      }
    };
    if let Some((n, sum)) = slot {
      *n += 1;
      sum.enrolled += t.enrolled;
      sum.completed += t.completed;
    }
  }
  if let Some((n, sum)) = uncategorized {
    buckets.push((None, n, sum));
  }
  let categories = buckets
    .into_iter()
    .map(|(category, course_count, sum)| CategoryStats {
      category_id: category.map(|c| c.id),
      name: category.map_or_else(|| UNCATEGORIZED.to_owned(), |c| c.name.clone()),
      course_count,
      enrollment_count: sum.enrolled,
      completed_count: sum.completed,
      completion_rate: rate(sum.completed, sum.enrolled),
    })
    .collect();

  let enrollment_trend =
    series(&input.enrollments, |e| e.enrolled_at, period.default_granularity());

  AdminDashboard { period, window, overview, top_courses, categories, enrollment_trend }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

impl<S, P, B> ReportEngine<S, P, B>
where
  S: AnalyticsStore,
  P: ProgressCalculator,
  B: BlobStorage,
{
  /// Platform overview, leaderboard and category breakdown. Admins only.
  #[tracing::instrument(skip_all, fields(caller = %caller.id, period = %params.period))]
  pub async fn admin_dashboard(
    &self,
    caller: &Caller,
    params: &AdminDashboardParams,
    now: DateTime<Utc>,
  ) -> Result<AdminDashboard, ReportError> {
    require_admin(caller)?;
    let window = resolve_period(params.period, now);

    let courses_q = CourseQuery::default();
    let lessons_q = LessonQuery::default();
    let enrollments_q = EnrollmentQuery { window: Some(window), ..Default::default() };
    let watches_q = WatchQuery { window: Some(window), ..Default::default() };

    let (students, courses, categories, lessons, enrollments, watches) = tokio::try_join!(
      fetch("students", self.store.list_profiles(Some(Role::Student))),
      fetch("courses", self.store.list_courses(&courses_q)),
      fetch("categories", self.store.list_categories()),
      fetch("lessons", self.store.list_lessons(&lessons_q)),
      fetch("enrollments", self.store.list_enrollments(&enrollments_q)),
      fetch("watch records", self.store.list_watch_records(&watches_q)),
    )?;

    tracing::debug!(enrollments = enrollments.len(), watches = watches.len(), "assembling admin dashboard");
    Ok(build(
      Inputs { students, courses, categories, lessons, enrollments, watches },
      params.period,
      window,
      self.config.top_courses,
    ))
  }
}
