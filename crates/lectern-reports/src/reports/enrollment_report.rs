//! Enrollment report: totals, a bucketed series, and breakdowns by category
//! and course.

use std::{
  cmp::Reverse,
  collections::{BTreeMap, HashMap},
};

use chrono::{DateTime, Utc};
use lectern_core::{
  access::Caller,
  catalog::{Category, Course},
  enrollment::{Enrollment, EnrollmentStatus},
  profile::Profile,
  store::{AnalyticsStore, CourseQuery, EnrollmentQuery, ProgressCalculator},
  window::{Granularity, TimeWindow, resolve},
};
use lectern_export::BlobStorage;
use serde::Serialize;
use uuid::Uuid;

use super::{Catalog, UNCATEGORIZED};
use crate::{
  ReportEngine, ReportError,
  aggregate::{
    average_elapsed_days, bucket_key, cumulative, distinct, group_by, rate, round2,
    status_counts, top_n_by,
  },
  engine::require_admin,
  fetch::{fetch, fetch_if},
  params::EnrollmentReportParams,
};

// ─── Report shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentReport {
  pub window:      TimeWindow,
  pub group_by:    Granularity,
  pub summary:     EnrollmentSummary,
  pub series:      Vec<EnrollmentPoint>,
  pub by_category: Vec<GroupStats>,
  pub by_course:   Vec<GroupStats>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details:     Option<Vec<EnrollmentDetail>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentSummary {
  pub total_enrollments:   usize,
  pub active:              usize,
  pub completed:           usize,
  pub dropped:             usize,
  /// Completed over total.
  pub conversion_rate:     f64,
  pub unique_students:     usize,
  pub unique_courses:      usize,
  pub avg_completion_days: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentPoint {
  pub bucket:                 String,
  pub new_enrollments:        usize,
  /// Completions that happened inside the window, bucketed by completion.
  pub completions:            usize,
  pub cumulative_enrollments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
  pub id:              Option<Uuid>,
  pub name:            String,
  pub enrollments:     usize,
  pub completed:       usize,
  pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentDetail {
  pub enrollment_id: Uuid,
  pub student_id:    Uuid,
  pub student_name:  Option<String>,
  pub student_email: Option<String>,
  pub course_id:     Uuid,
  pub course_title:  Option<String>,
  pub category_name: Option<String>,
  pub status:        EnrollmentStatus,
  pub enrolled_at:   DateTime<Utc>,
  pub completed_at:  Option<DateTime<Utc>>,
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

pub(crate) struct Inputs {
  pub courses:     Vec<Course>,
  pub categories:  Vec<Category>,
  pub enrollments: Vec<Enrollment>,
  pub profiles:    Option<Vec<Profile>>,
}

pub(crate) fn build(
  input: Inputs,
  window: TimeWindow,
  granularity: Granularity,
) -> EnrollmentReport {
  let catalog = Catalog::new(&input.courses, &input.categories, &[]);
  let enrollments = &input.enrollments;
  let counts = status_counts(enrollments);

  let summary = EnrollmentSummary {
    total_enrollments:   counts.total,
    active:              counts.active,
    completed:           counts.completed,
    dropped:             counts.dropped,
    conversion_rate:     counts.completion_rate(),
    unique_students:     distinct(enrollments, |e| e.student_id),
    unique_courses:      distinct(enrollments, |e| e.course_id),
    avg_completion_days: round2(average_elapsed_days(
      enrollments.iter().map(|e| (e.enrolled_at, e.completed_at)),
    )),
  };

  let mut buckets: BTreeMap<String, (usize, usize)> = BTreeMap::new();
  for e in enrollments {
    buckets.entry(bucket_key(e.enrolled_at, granularity)).or_default().0 += 1;
    if let Some(done) = e.completed_at.filter(|at| window.contains(*at)) {
      buckets.entry(bucket_key(done, granularity)).or_default().1 += 1;
    }
  }
  let running = cumulative(buckets.values().map(|(new, _)| *new));
  let series = buckets
    .into_iter()
    .zip(running)
    .map(|((bucket, (new_enrollments, completions)), cumulative_enrollments)| EnrollmentPoint {
      bucket,
      new_enrollments,
      completions,
      cumulative_enrollments,
    })
    .collect();

  let by_category_groups =
    group_by(enrollments, |e| catalog.category_of(e.course_id).map(|c| c.id));
  let mut by_category: Vec<GroupStats> = input
    .categories
    .iter()
    .filter_map(|c| {
      let group = by_category_groups.get(&Some(c.id))?;
      Some(group_stats(Some(c.id), c.name.clone(), group))
    })
    .collect();
  if let Some(g) = by_category_groups.get(&None) {
    by_category.push(group_stats(None, UNCATEGORIZED.to_owned(), g));
  }
  let by_category = top_n_by(by_category, |g| g.enrollments, usize::MAX);

  let by_course_groups = group_by(enrollments, |e| e.course_id);
  let by_course: Vec<GroupStats> = input
    .courses
    .iter()
    .filter_map(|c| {
      let group = by_course_groups.get(&c.id)?;
      Some(group_stats(Some(c.id), c.title.clone(), group))
    })
    .collect();
  let by_course = top_n_by(by_course, |g| g.enrollments, usize::MAX);

  let details = input.profiles.as_deref().map(|profiles| {
    let profiles: HashMap<Uuid, &Profile> = profiles.iter().map(|p| (p.id, p)).collect();
    let mut rows: Vec<EnrollmentDetail> = enrollments
      .iter()
      .map(|e| {
        let student = profiles.get(&e.student_id);
        EnrollmentDetail {
          enrollment_id: e.id,
          student_id:    e.student_id,
          student_name:  student.and_then(|p| p.full_name.clone()),
          student_email: student.map(|p| p.email.clone()),
          course_id:     e.course_id,
          course_title:  catalog.course_title(e.course_id),
          category_name: catalog.category_name(e.course_id),
          status:        e.status,
          enrolled_at:   e.enrolled_at,
          completed_at:  e.completed_at,
        }
      })
      .collect();
    rows.sort_by_key(|r| Reverse(r.enrolled_at));
    rows
  });

  EnrollmentReport {
    window,
    group_by: granularity,
    summary,
    series,
    by_category,
    by_course,
    details,
  }
}

fn group_stats(id: Option<Uuid>, name: String, group: &[&Enrollment]) -> GroupStats {
  let counts = status_counts(group.iter().copied());
  GroupStats {
    id,
    name,
    enrollments: counts.total,
    completed: counts.completed,
    completion_rate: rate(counts.completed, counts.total),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

impl<S, P, B> ReportEngine<S, P, B>
where
  S: AnalyticsStore,
  P: ProgressCalculator,
  B: BlobStorage,
{
  /// Enrollment activity over a period or explicit date range. Admins only.
  #[tracing::instrument(skip_all, fields(
    caller = %caller.id,
    period = %params.period,
    group_by = %params.group_by,
  ))]
  pub async fn enrollment_report(
    &self,
    caller: &Caller,
    params: &EnrollmentReportParams,
    now: DateTime<Utc>,
  ) -> Result<EnrollmentReport, ReportError> {
    require_admin(caller)?;
    let window = resolve(params.period, params.range(), now)?;

    let courses_q = CourseQuery::default();
    let enrollments_q = EnrollmentQuery {
      window:      Some(window),
      student_id:  None,
      course_id:   params.course_id,
      category_id: params.category_id,
      status:      params.status,
    };

    let (courses, categories, enrollments, profiles) = tokio::try_join!(
      fetch("courses", self.store.list_courses(&courses_q)),
      fetch("categories", self.store.list_categories()),
      fetch("enrollments", self.store.list_enrollments(&enrollments_q)),
      fetch_if(params.include_details, "profiles", self.store.list_profiles(None)),
    )?;

    tracing::debug!(enrollments = enrollments.len(), "assembling enrollment report");
    Ok(build(Inputs { courses, categories, enrollments, profiles }, window, params.group_by))
  }
}
