//! JSON REST API for Lectern reports.
//!
//! Exposes an axum [`Router`] backed by a [`ReportEngine`]. Handlers read the
//! authenticated [`Caller`](lectern_core::access::Caller) from request
//! extensions; resolving credentials to a caller is the host's job.
//!
//! Every response body is an [`Outcome`](lectern_reports::Outcome) envelope.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", lectern_api::api_router(engine.clone()))
//! .layer(Extension(caller))
//! ```

pub mod error;
pub mod exports;
pub mod reports;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use lectern_core::store::{AnalyticsStore, ProgressCalculator};
use lectern_export::BlobStorage;
use lectern_reports::ReportEngine;

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P, B>(engine: Arc<ReportEngine<S, P, B>>) -> Router<()>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
  B: BlobStorage + 'static,
{
  Router::new()
    // Dashboards
    .route("/reports/admin/dashboard", get(reports::admin_dashboard::<S, P, B>))
    .route("/reports/courses/{id}/dashboard", get(reports::course_dashboard::<S, P, B>))
    .route("/reports/students/{id}/dashboard", get(reports::student_dashboard::<S, P, B>))
    .route("/reports/students/{id}/progress", get(reports::learning_progress::<S, P, B>))
    // Reports
    .route("/reports/enrollments", get(reports::enrollment_report::<S, P, B>))
    .route("/reports/courses/performance", get(reports::course_performance::<S, P, B>))
    // Exports
    .route("/exports", post(exports::create::<S, P, B>))
    .with_state(engine)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use std::{
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
  };

  use axum::{
    Extension,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use chrono::{TimeDelta, Utc};
  use lectern_core::{
    access::Caller,
    catalog::{Course, Lesson},
    enrollment::{Enrollment, EnrollmentStatus, LessonWatchRecord},
    profile::{Profile, Role},
  };
  use lectern_export::FsBlobStore;
  use lectern_reports::EngineConfig;
  use lectern_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  type Engine = ReportEngine<SqliteStore, SqliteStore, FsBlobStore>;

  struct Fixture {
    engine:  Arc<Engine>,
    admin:   Caller,
    student: Caller,
    course:  Uuid,
  }

  fn scratch_dir() -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    std::env::temp_dir().join(format!(
      "lectern-api-test-{}-{}",
      std::process::id(),
      NEXT.fetch_add(1, Ordering::Relaxed)
    ))
  }

  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let now = Utc::now();
    let yesterday = now - TimeDelta::days(1);

    let admin = Profile {
      id:         Uuid::new_v4(),
      full_name:  Some("Grace".into()),
      email:      "grace@example.com".into(),
      role:       Role::Admin,
      created_at: yesterday,
    };
    let student = Profile {
      id:         Uuid::new_v4(),
      full_name:  Some("Ada".into()),
      email:      "ada@example.com".into(),
      role:       Role::Student,
      created_at: yesterday,
    };
    store.insert_profile(&admin).await.unwrap();
    store.insert_profile(&student).await.unwrap();

    let course = Course {
      id:           Uuid::new_v4(),
      title:        "Intro to SQL".into(),
      slug:         "intro-sql".into(),
      category_id:  None,
      is_published: true,
      created_at:   yesterday,
    };
    store.insert_course(&course).await.unwrap();
    let lesson = Lesson {
      id:               Uuid::new_v4(),
      course_id:        course.id,
      title:            "Selecting rows".into(),
      order_index:      1,
      duration_seconds: Some(600),
      is_published:     true,
    };
    store.insert_lesson(&lesson).await.unwrap();

    store
      .insert_enrollment(&Enrollment {
        id:           Uuid::new_v4(),
        student_id:   student.id,
        course_id:    course.id,
        status:       EnrollmentStatus::Active,
        enrolled_at:  yesterday,
        completed_at: None,
      })
      .await
      .unwrap();
    store
      .insert_watch_record(&LessonWatchRecord {
        id:              Uuid::new_v4(),
        student_id:      student.id,
        lesson_id:       lesson.id,
        watched_seconds: 300,
        completed_at:    None,
        last_watched_at: yesterday,
      })
      .await
      .unwrap();

    let store = Arc::new(store);
    let blobs = FsBlobStore::new(scratch_dir(), "http://files.test", "test-secret");
    let engine = ReportEngine::new(store.clone(), store, blobs, EngineConfig::default());

    Fixture {
      engine:  Arc::new(engine),
      admin:   Caller::admin(admin.id),
      student: Caller::student(student.id),
      course:  course.id,
    }
  }

  async fn send(fx: &Fixture, caller: Caller, req: Request<Body>) -> Response {
    api_router(fx.engine.clone())
      .layer(Extension(caller))
      .oneshot(req)
      .await
      .unwrap()
  }

  async fn get(fx: &Fixture, caller: Caller, uri: &str) -> Response {
    send(fx, caller, Request::get(uri).body(Body::empty()).unwrap()).await
  }

  async fn json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  // ── Dashboards ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn admin_dashboard_wraps_report_in_envelope() {
    let fx = fixture().await;
    let resp = get(&fx, fx.admin, "/reports/admin/dashboard?period=7d").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json(resp).await;
    assert_eq!(body["success"], true);
    assert!(body.get("error").is_none());
    assert_eq!(body["data"]["period"], "7d");
    assert_eq!(body["data"]["overview"]["total_enrollments"], 1);
    assert_eq!(body["data"]["overview"]["active_learners"], 1);
  }

  #[tokio::test]
  async fn admin_dashboard_forbidden_for_students() {
    let fx = fixture().await;
    let resp = get(&fx, fx.student, "/reports/admin/dashboard").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body = json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body.get("data").is_none());
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn unknown_period_is_bad_request() {
    let fx = fixture().await;
    let resp = get(&fx, fx.admin, "/reports/admin/dashboard?period=2w").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["success"], false);
  }

  #[tokio::test]
  async fn course_dashboard_for_missing_course_is_404() {
    let fx = fixture().await;
    let uri = format!("/reports/courses/{}/dashboard", Uuid::new_v4());
    let resp = get(&fx, fx.admin, &uri).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn course_dashboard_student_details_require_admin() {
    let fx = fixture().await;
    let uri = format!("/reports/courses/{}/dashboard?include_student_details=true", fx.course);

    let resp = get(&fx, fx.student, &uri).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = get(&fx, fx.admin, &uri).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["data"]["student_progress"].as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn malformed_course_id_is_bad_request() {
    let fx = fixture().await;
    let resp = get(&fx, fx.admin, "/reports/courses/not-a-uuid/dashboard").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn students_see_only_their_own_dashboard() {
    let fx = fixture().await;
    let own = format!("/reports/students/{}/dashboard", fx.student.id);
    assert_eq!(get(&fx, fx.student, &own).await.status(), StatusCode::OK);

    let other = format!("/reports/students/{}/dashboard", Uuid::new_v4());
    assert_eq!(get(&fx, fx.student, &other).await.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn learning_progress_filters_by_course() {
    let fx = fixture().await;
    let uri = format!("/reports/students/{}/progress?course_id={}", fx.student.id, fx.course);
    let resp = get(&fx, fx.student, &uri).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["data"]["courses"].as_array().unwrap().len(), 1);
  }

  // ── Reports ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn enrollment_report_with_details() {
    let fx = fixture().await;
    let resp = get(&fx, fx.admin, "/reports/enrollments?group_by=day&include_details=true").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["data"]["details"].as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn course_performance_rejects_out_of_range_limit() {
    let fx = fixture().await;
    let resp = get(&fx, fx.admin, "/reports/courses/performance?limit=0").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = get(&fx, fx.admin, "/reports/courses/performance?limit=5").await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  // ── Exports ─────────────────────────────────────────────────────────────────

  fn post_export(body: &str) -> Request<Body> {
    Request::post("/exports")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_owned()))
      .unwrap()
  }

  #[tokio::test]
  async fn export_returns_201_with_receipt() {
    let fx = fixture().await;
    let req = post_export(r#"{"entity":"enrollments","format":"csv","file_name":"weekly"}"#);
    let resp = send(&fx, fx.admin, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["file_name"], "weekly.csv");
    assert_eq!(body["data"]["record_count"], 1);
    assert!(body["data"]["file_url"].as_str().unwrap().starts_with("http://files.test/"));
  }

  #[tokio::test]
  async fn export_of_unsupported_format_is_bad_request() {
    let fx = fixture().await;
    let resp = send(&fx, fx.admin, post_export(r#"{"entity":"analytics","format":"pdf"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json(resp).await;
    assert_eq!(body["error"], "unsupported export format: pdf");
  }

  #[tokio::test]
  async fn export_with_malformed_body_is_bad_request() {
    let fx = fixture().await;
    let resp = send(&fx, fx.admin, post_export(r#"{"entity":"everything"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["success"], false);
  }
}
