//! The export entry point: pick the rows for an entity, then hand them to
//! the exporter.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use lectern_core::{
  access::Caller,
  store::{AnalyticsStore, CourseQuery, EnrollmentQuery, LessonQuery, ProgressCalculator, WatchQuery},
  window::{Period, TimeWindow, resolve},
};
use lectern_export::{BlobStorage, ExportEntity, ExportFormat, ExportReceipt, Record};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  ReportEngine, ReportError,
  aggregate::farthest_watched,
  engine::require_admin,
  fetch::fetch,
  params::{CoursePerformanceParams, EnrollmentReportParams, ExportParams, LearningProgressParams},
  reports::{
    Catalog,
    learning_progress::{CourseProgress, course_rows},
  },
};

/// One raw watch record, flattened for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
  pub student_id:      Uuid,
  pub lesson_id:       Uuid,
  pub lesson_title:    Option<String>,
  pub course_id:       Option<Uuid>,
  pub course_title:    Option<String>,
  pub watched_seconds: u64,
  pub completed:       bool,
  pub completed_at:    Option<DateTime<Utc>>,
  pub last_watched_at: DateTime<Utc>,
}

fn to_records<T: Serialize>(rows: &[T]) -> Result<Vec<Record>, ReportError> {
  rows
    .iter()
    .map(|row| match serde_json::to_value(row) {
      Ok(Value::Object(record)) => Ok(record),
      Ok(other) => Ok(Record::from_iter([("value".to_owned(), other)])),
      Err(e) => Err(ReportError::Export(e.into())),
    })
    .collect()
}

/// Which student an export is about. Students must name themselves; admins
/// may leave it open to cover everyone.
fn export_subject(caller: &Caller, student_id: Option<Uuid>) -> Result<Option<Uuid>, ReportError> {
  match student_id {
    Some(id) if caller.can_view_student(id) => Ok(Some(id)),
    Some(_) => Err(ReportError::Forbidden),
    None if caller.is_admin() => Ok(None),
    None => Err(ReportError::validation("student_id is required")),
  }
}

impl<S, P, B> ReportEngine<S, P, B>
where
  S: AnalyticsStore,
  P: ProgressCalculator,
  B: BlobStorage,
{
  /// Build the rows for `params.entity`, encode them and return a signed
  /// download link.
  #[tracing::instrument(skip_all, fields(
    caller = %caller.id,
    entity = %params.entity,
    format = %params.format,
  ))]
  pub async fn export(
    &self,
    caller: &Caller,
    params: &ExportParams,
    now: DateTime<Utc>,
  ) -> Result<ExportReceipt, ReportError> {
    if !matches!(params.format, ExportFormat::Csv | ExportFormat::Json) {
      return Err(lectern_export::Error::UnsupportedFormat(params.format).into());
    }

    let records = match params.entity {
      ExportEntity::Enrollments => {
        require_admin(caller)?;
        let report = self
          .enrollment_report(
            caller,
            &EnrollmentReportParams {
              period:          params.period.unwrap_or_default(),
              start_date:      params.start_date,
              end_date:        params.end_date,
              group_by:        Default::default(),
              course_id:       params.course_id,
              category_id:     params.category_id,
              status:          params.status,
              include_details: true,
            },
            now,
          )
          .await?;
        to_records(&report.details.unwrap_or_default())?
      }
      ExportEntity::Analytics => {
        require_admin(caller)?;
        let report = self
          .course_performance(
            caller,
            &CoursePerformanceParams {
              period:      params.period.unwrap_or_default(),
              category_id: params.category_id,
              limit:       None,
            },
            now,
          )
          .await?;
        to_records(&report.courses)?
      }
      ExportEntity::Progress => {
        let rows = match export_subject(caller, params.student_id)? {
          Some(student_id) => {
            let report = self
              .learning_progress(
                caller,
                &LearningProgressParams {
                  student_id,
                  course_id: params.course_id,
                  period: params.period,
                },
                now,
              )
              .await?;
            report.courses
          }
          None => {
            let window = resolve(params.period.unwrap_or(Period::All), params.range(), now)?;
            self.cohort_progress(window, params.course_id).await?
          }
        };
        to_records(&rows)?
      }
      ExportEntity::UserActivity => {
        let student_id = export_subject(caller, params.student_id)?;
        let window = resolve(params.period.unwrap_or_default(), params.range(), now)?;
        let rows = self.activity_rows(window, student_id, params.course_id).await?;
        to_records(&rows)?
      }
    };

    let receipt = self
      .exporter
      .export(params.entity, params.format, params.file_name.as_deref(), &records, now)
      .await
      .map_err(|e| {
        tracing::error!(error = %e, "export failed");
        ReportError::from(e)
      })?;
    Ok(receipt)
  }

  /// Progress rows for every enrollment in `window`.
  async fn cohort_progress(
    &self,
    window: TimeWindow,
    course_id: Option<Uuid>,
  ) -> Result<Vec<CourseProgress>, ReportError> {
    let courses_q = CourseQuery::default();
    let lessons_q = LessonQuery { course_id, published_only: false };
    let enrollments_q = EnrollmentQuery { window: Some(window), course_id, ..Default::default() };
    let watches_q = WatchQuery { window: Some(window), course_id, ..Default::default() };

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
    let catalog = Catalog::new(&courses, &categories, &lessons);
    Ok(course_rows(&catalog, &enrollments, &progress, &farthest_watched(&watches)))
  }

  /// Raw watch records, newest first.
  async fn activity_rows(
    &self,
    window: TimeWindow,
    student_id: Option<Uuid>,
    course_id: Option<Uuid>,
  ) -> Result<Vec<ActivityRow>, ReportError> {
    let courses_q = CourseQuery::default();
    let lessons_q = LessonQuery { course_id, published_only: false };
    let watches_q = WatchQuery { window: Some(window), student_id, course_id, lesson_id: None };

    let (courses, lessons, watches) = tokio::try_join!(
      fetch("courses", self.store.list_courses(&courses_q)),
      fetch("lessons", self.store.list_lessons(&lessons_q)),
      fetch("watch records", self.store.list_watch_records(&watches_q)),
    )?;

    let catalog = Catalog::new(&courses, &[], &lessons);
    let mut rows: Vec<ActivityRow> = watches
      .iter()
      .map(|w| {
        let lesson = catalog.lessons.get(&w.lesson_id);
        let course_id = lesson.map(|l| l.course_id);
        ActivityRow {
          student_id:      w.student_id,
          lesson_id:       w.lesson_id,
          lesson_title:    lesson.map(|l| l.title.clone()),
          course_id,
          course_title:    course_id.and_then(|id| catalog.course_title(id)),
          watched_seconds: w.watched_seconds,
          completed:       w.is_completed(),
          completed_at:    w.completed_at,
          last_watched_at: w.last_watched_at,
        }
      })
      .collect();
    rows.sort_by_key(|r| Reverse(r.last_watched_at));
    Ok(rows)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn export_subject_rules() {
    let me = Uuid::new_v4();
    let student = Caller::student(me);
    let admin = Caller::admin(Uuid::new_v4());

    assert_eq!(export_subject(&student, Some(me)).unwrap(), Some(me));
    assert!(matches!(export_subject(&student, Some(Uuid::new_v4())), Err(ReportError::Forbidden)));
    assert!(matches!(export_subject(&student, None), Err(ReportError::Validation(_))));
    assert_eq!(export_subject(&admin, None).unwrap(), None);
    assert_eq!(export_subject(&admin, Some(me)).unwrap(), Some(me));
  }

  #[test]
  fn rows_flatten_to_ordered_records() {
    let row = ActivityRow {
      student_id:      Uuid::nil(),
      lesson_id:       Uuid::nil(),
      lesson_title:    Some("Joins".into()),
      course_id:       None,
      course_title:    None,
      watched_seconds: 42,
      completed:       false,
      completed_at:    None,
      last_watched_at: DateTime::<Utc>::UNIX_EPOCH,
    };
    let records = to_records(&[row]).unwrap();
    let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
    assert_eq!(keys[..3], ["student_id", "lesson_id", "lesson_title"]);
    assert_eq!(records[0]["watched_seconds"], 42);
    assert!(records[0]["course_id"].is_null());
  }
}
