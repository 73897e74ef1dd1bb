//! Handlers for `/reports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reports/admin/dashboard` | `?period`; admins only |
//! | `GET`  | `/reports/courses/{id}/dashboard` | `?period&include_student_details` |
//! | `GET`  | `/reports/students/{id}/dashboard` | `?period`; admin or self |
//! | `GET`  | `/reports/students/{id}/progress` | `?course_id&period`; admin or self |
//! | `GET`  | `/reports/enrollments` | See [`EnrollmentReportParams`] |
//! | `GET`  | `/reports/courses/performance` | `?period&category_id&limit`; admins only |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{
    Path, Query, State,
    rejection::{PathRejection, QueryRejection},
  },
};
use chrono::Utc;
use lectern_core::{
  access::Caller,
  store::{AnalyticsStore, ProgressCalculator},
  window::Period,
};
use lectern_export::BlobStorage;
use lectern_reports::{
  AdminDashboardParams, CourseDashboardParams, CoursePerformanceParams,
  EnrollmentReportParams, LearningProgressParams, Outcome, ReportEngine,
  StudentDashboardParams,
  reports::{
    admin_dashboard::AdminDashboard, course_dashboard::CourseDashboard,
    course_performance::CoursePerformance, enrollment_report::EnrollmentReport,
    learning_progress::LearningProgress, student_dashboard::StudentDashboard,
  },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

type Engine<S, P, B> = Arc<ReportEngine<S, P, B>>;

pub(crate) fn query<T>(q: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
  q.map(|Query(t)| t).map_err(|e| ApiError::BadRequest(e.body_text()))
}

pub(crate) fn path<T>(p: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
  p.map(|Path(t)| t).map_err(|e| ApiError::BadRequest(e.body_text()))
}

// ─── Admin dashboard ──────────────────────────────────────────────────────────

/// `GET /reports/admin/dashboard[?period=30d]`
pub async fn admin_dashboard<S, P, B>(
  State(engine): State<Engine<S, P, B>>,
  Extension(caller): Extension<Caller>,
  params: Result<Query<AdminDashboardParams>, QueryRejection>,
) -> Result<Json<Outcome<AdminDashboard>>, ApiError>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
  B: BlobStorage + 'static,
{
  let params = query(params)?;
  let report = engine.admin_dashboard(&caller, &params, Utc::now()).await?;
  Ok(Json(Outcome::ok(report)))
}

// ─── Course dashboard ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CourseDashboardQuery {
  #[serde(default)]
  pub period:                  Period,
  #[serde(default)]
  pub include_student_details: bool,
}

/// `GET /reports/courses/{id}/dashboard[?period=...][&include_student_details=true]`
pub async fn course_dashboard<S, P, B>(
  State(engine): State<Engine<S, P, B>>,
  Extension(caller): Extension<Caller>,
  course_id: Result<Path<Uuid>, PathRejection>,
  params: Result<Query<CourseDashboardQuery>, QueryRejection>,
) -> Result<Json<Outcome<CourseDashboard>>, ApiError>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
  B: BlobStorage + 'static,
{
  let course_id = path(course_id)?;
  let q = query(params)?;
  let params = CourseDashboardParams {
    course_id,
    period: q.period,
    include_student_details: q.include_student_details,
  };
  let report = engine.course_dashboard(&caller, &params, Utc::now()).await?;
  Ok(Json(Outcome::ok(report)))
}

// ─── Student dashboard ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
  #[serde(default)]
  pub period: Period,
}

/// `GET /reports/students/{id}/dashboard[?period=...]`
pub async fn student_dashboard<S, P, B>(
  State(engine): State<Engine<S, P, B>>,
  Extension(caller): Extension<Caller>,
  student_id: Result<Path<Uuid>, PathRejection>,
  params: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<Outcome<StudentDashboard>>, ApiError>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
  B: BlobStorage + 'static,
{
  let params = StudentDashboardParams {
    student_id: path(student_id)?,
    period:     query(params)?.period,
  };
  let report = engine.student_dashboard(&caller, &params, Utc::now()).await?;
  Ok(Json(Outcome::ok(report)))
}

// ─── Learning progress ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
  pub course_id: Option<Uuid>,
  /// Defaults to all time.
  pub period:    Option<Period>,
}

/// `GET /reports/students/{id}/progress[?course_id=...][&period=...]`
pub async fn learning_progress<S, P, B>(
  State(engine): State<Engine<S, P, B>>,
  Extension(caller): Extension<Caller>,
  student_id: Result<Path<Uuid>, PathRejection>,
  params: Result<Query<ProgressQuery>, QueryRejection>,
) -> Result<Json<Outcome<LearningProgress>>, ApiError>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
  B: BlobStorage + 'static,
{
  let student_id = path(student_id)?;
  let q = query(params)?;
  let params = LearningProgressParams { student_id, course_id: q.course_id, period: q.period };
  let report = engine.learning_progress(&caller, &params, Utc::now()).await?;
  Ok(Json(Outcome::ok(report)))
}

// ─── Enrollment report ────────────────────────────────────────────────────────

/// `GET /reports/enrollments[?period][&start_date][&end_date][&group_by][&course_id][&category_id][&status][&include_details]`
pub async fn enrollment_report<S, P, B>(
  State(engine): State<Engine<S, P, B>>,
  Extension(caller): Extension<Caller>,
  params: Result<Query<EnrollmentReportParams>, QueryRejection>,
) -> Result<Json<Outcome<EnrollmentReport>>, ApiError>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
  B: BlobStorage + 'static,
{
  let params = query(params)?;
  let report = engine.enrollment_report(&caller, &params, Utc::now()).await?;
  Ok(Json(Outcome::ok(report)))
}

// ─── Course performance ───────────────────────────────────────────────────────

/// `GET /reports/courses/performance[?period][&category_id][&limit]`
pub async fn course_performance<S, P, B>(
  State(engine): State<Engine<S, P, B>>,
  Extension(caller): Extension<Caller>,
  params: Result<Query<CoursePerformanceParams>, QueryRejection>,
) -> Result<Json<Outcome<CoursePerformance>>, ApiError>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
  B: BlobStorage + 'static,
{
  let params = query(params)?;
  let report = engine.course_performance(&caller, &params, Utc::now()).await?;
  Ok(Json(Outcome::ok(report)))
}
