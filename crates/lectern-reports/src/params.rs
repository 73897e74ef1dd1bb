//! Parameter objects for each report.
//!
//! All of them deserialize from query strings or JSON, so the HTTP layer can
//! take them straight off the wire.

use chrono::NaiveDate;
use lectern_core::{
  enrollment::EnrollmentStatus,
  window::{DateRange, Granularity, Period},
};
use lectern_export::{ExportEntity, ExportFormat};
use serde::Deserialize;
use uuid::Uuid;

use crate::ReportError;

/// Default and upper bound for [`CoursePerformanceParams::limit`].
pub const DEFAULT_PERFORMANCE_LIMIT: usize = 10;
pub const MAX_PERFORMANCE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminDashboardParams {
  #[serde(default)]
  pub period: Period,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseDashboardParams {
  pub course_id:               Uuid,
  #[serde(default)]
  pub period:                  Period,
  /// Per-student rows; admins only.
  #[serde(default)]
  pub include_student_details: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentDashboardParams {
  pub student_id: Uuid,
  #[serde(default)]
  pub period:     Period,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearningProgressParams {
  pub student_id: Uuid,
  pub course_id:  Option<Uuid>,
  /// Defaults to [`Period::All`].
  pub period:     Option<Period>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentReportParams {
  /// Fallback when no explicit dates are given.
  #[serde(default)]
  pub period:          Period,
  pub start_date:      Option<NaiveDate>,
  /// Inclusive.
  pub end_date:        Option<NaiveDate>,
  #[serde(default)]
  pub group_by:        Granularity,
  pub course_id:       Option<Uuid>,
  pub category_id:     Option<Uuid>,
  pub status:          Option<EnrollmentStatus>,
  #[serde(default)]
  pub include_details: bool,
}

impl EnrollmentReportParams {
  pub fn range(&self) -> DateRange {
    DateRange { start_date: self.start_date, end_date: self.end_date }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoursePerformanceParams {
  #[serde(default)]
  pub period:      Period,
  pub category_id: Option<Uuid>,
  pub limit:       Option<usize>,
}

impl CoursePerformanceParams {
  pub fn limit(&self) -> Result<usize, ReportError> {
    match self.limit {
      None => Ok(DEFAULT_PERFORMANCE_LIMIT),
      Some(n) if (1..=MAX_PERFORMANCE_LIMIT).contains(&n) => Ok(n),
      Some(n) => Err(ReportError::validation(format!(
        "limit must be between 1 and {MAX_PERFORMANCE_LIMIT}, got {n}"
      ))),
    }
  }
}

/// Body of an export request.
///
/// Filters that do not apply to `entity` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportParams {
  pub entity:      ExportEntity,
  #[serde(default)]
  pub format:      ExportFormat,
  /// File name without extension; generated when absent.
  pub file_name:   Option<String>,
  pub period:      Option<Period>,
  pub start_date:  Option<NaiveDate>,
  pub end_date:    Option<NaiveDate>,
  pub student_id:  Option<Uuid>,
  pub course_id:   Option<Uuid>,
  pub category_id: Option<Uuid>,
  pub status:      Option<EnrollmentStatus>,
}

impl ExportParams {
  pub fn new(entity: ExportEntity, format: ExportFormat) -> Self {
    Self {
      entity,
      format,
      file_name: None,
      period: None,
      start_date: None,
      end_date: None,
      student_id: None,
      course_id: None,
      category_id: None,
      status: None,
    }
  }

  pub fn range(&self) -> DateRange {
    DateRange { start_date: self.start_date, end_date: self.end_date }
  }
}
