//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use lectern_core::{
  catalog::{Category, Course, Lesson},
  enrollment::{Enrollment, EnrollmentStatus, LessonWatchRecord},
  profile::{Profile, Role},
  store::{
    AnalyticsStore, CourseQuery, EnrollmentQuery, LessonQuery,
    ProgressCalculator, WatchQuery,
  },
  window::{DateRange, Period, TimeWindow, resolve},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(day: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
}

fn profile(email: &str, role: Role) -> Profile {
  Profile {
    id:         Uuid::new_v4(),
    full_name:  Some(email.split('@').next().unwrap_or(email).to_owned()),
    email:      email.to_owned(),
    role,
    created_at: at(1),
  }
}

fn course(slug: &str, category_id: Option<Uuid>, published: bool) -> Course {
  Course {
    id: Uuid::new_v4(),
    title: slug.to_uppercase(),
    slug: slug.to_owned(),
    category_id,
    is_published: published,
    created_at: at(1),
  }
}

fn lesson(course_id: Uuid, order_index: u32, published: bool) -> Lesson {
  Lesson {
    id: Uuid::new_v4(),
    course_id,
    title: format!("Lesson {order_index}"),
    order_index,
    duration_seconds: Some(600),
    is_published: published,
  }
}

fn enrollment(student: Uuid, course: Uuid, status: EnrollmentStatus, day: u32) -> Enrollment {
  Enrollment {
    id: Uuid::new_v4(),
    student_id: student,
    course_id: course,
    status,
    enrolled_at: at(day),
    completed_at: (status == EnrollmentStatus::Completed).then(|| at(day) + TimeDelta::days(3)),
  }
}

fn watch(student: Uuid, lesson: Uuid, seconds: u64, done: bool, day: u32) -> LessonWatchRecord {
  LessonWatchRecord {
    id:              Uuid::new_v4(),
    student_id:      student,
    lesson_id:       lesson,
    watched_seconds: seconds,
    completed_at:    done.then(|| at(day)),
    last_watched_at: at(day),
  }
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_profile() {
  let s = store().await;
  let p = profile("ada@example.com", Role::Student);
  s.insert_profile(&p).await.unwrap();

  let fetched = s.get_profile(p.id).await.unwrap().unwrap();
  assert_eq!(fetched.email, "ada@example.com");
  assert_eq!(fetched.role, Role::Student);
  assert_eq!(fetched.created_at, p.created_at);
}

#[tokio::test]
async fn get_profile_missing_returns_none() {
  let s = store().await;
  assert!(s.get_profile(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_profiles_filtered_by_role() {
  let s = store().await;
  s.insert_profile(&profile("a@example.com", Role::Student)).await.unwrap();
  s.insert_profile(&profile("b@example.com", Role::Admin)).await.unwrap();
  s.insert_profile(&profile("c@example.com", Role::Student)).await.unwrap();

  assert_eq!(s.list_profiles(None).await.unwrap().len(), 3);
  let students = s.list_profiles(Some(Role::Student)).await.unwrap();
  assert_eq!(students.len(), 2);
  assert!(students.iter().all(|p| p.role == Role::Student));
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn courses_filter_by_category_and_publication() {
  let s = store().await;
  let cat = Category { id: Uuid::new_v4(), name: "Data".into() };
  s.insert_category(&cat).await.unwrap();

  let a = course("sql", Some(cat.id), true);
  let b = course("draft", Some(cat.id), false);
  let c = course("misc", None, true);
  for c in [&a, &b, &c] {
    s.insert_course(c).await.unwrap();
  }

  assert_eq!(s.list_courses(&CourseQuery::default()).await.unwrap().len(), 3);

  let in_cat = s
    .list_courses(&CourseQuery { category_id: Some(cat.id), published_only: false })
    .await
    .unwrap();
  assert_eq!(in_cat.len(), 2);

  let published = s
    .list_courses(&CourseQuery { category_id: Some(cat.id), published_only: true })
    .await
    .unwrap();
  assert_eq!(published.len(), 1);
  assert_eq!(published[0].slug, "sql");

  let fetched = s.get_course(c.id).await.unwrap().unwrap();
  assert!(fetched.category_id.is_none());
  assert_eq!(s.list_categories().await.unwrap()[0].name, "Data");
}

#[tokio::test]
async fn lessons_come_back_in_order() {
  let s = store().await;
  let c = course("rust", None, true);
  s.insert_course(&c).await.unwrap();
  for idx in [3, 1, 2] {
    s.insert_lesson(&lesson(c.id, idx, idx != 2)).await.unwrap();
  }

  let all = s
    .list_lessons(&LessonQuery { course_id: Some(c.id), published_only: false })
    .await
    .unwrap();
  let order: Vec<u32> = all.iter().map(|l| l.order_index).collect();
  assert_eq!(order, [1, 2, 3]);

  let published = s
    .list_lessons(&LessonQuery { course_id: Some(c.id), published_only: true })
    .await
    .unwrap();
  assert_eq!(published.len(), 2);
}

// ─── Activity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn enrollments_respect_window_and_scope() {
  let s = store().await;
  let cat = Category { id: Uuid::new_v4(), name: "Web".into() };
  s.insert_category(&cat).await.unwrap();
  let web = course("web", Some(cat.id), true);
  let other = course("other", None, true);
  s.insert_course(&web).await.unwrap();
  s.insert_course(&other).await.unwrap();
  let ada = profile("ada@example.com", Role::Student);
  let bob = profile("bob@example.com", Role::Student);
  s.insert_profile(&ada).await.unwrap();
  s.insert_profile(&bob).await.unwrap();

  s.insert_enrollment(&enrollment(ada.id, web.id, EnrollmentStatus::Completed, 2)).await.unwrap();
  s.insert_enrollment(&enrollment(bob.id, web.id, EnrollmentStatus::Active, 10)).await.unwrap();
  s.insert_enrollment(&enrollment(ada.id, other.id, EnrollmentStatus::Dropped, 20)).await.unwrap();

  let window = TimeWindow { start: at(2), end: at(20) };
  let in_window = s
    .list_enrollments(&EnrollmentQuery { window: Some(window), ..Default::default() })
    .await
    .unwrap();
  // Start is inclusive, end exclusive.
  assert_eq!(in_window.len(), 2);
  assert!(in_window[0].enrolled_at <= in_window[1].enrolled_at);

  let by_category = s
    .list_enrollments(&EnrollmentQuery { category_id: Some(cat.id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_category.len(), 2);

  let ada_completed = s
    .list_enrollments(&EnrollmentQuery {
      student_id: Some(ada.id),
      status: Some(EnrollmentStatus::Completed),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(ada_completed.len(), 1);
  assert!(ada_completed[0].completed_at.is_some());

  let none = s
    .list_enrollments(&EnrollmentQuery { course_id: Some(Uuid::new_v4()), ..Default::default() })
    .await
    .unwrap();
  assert!(none.is_empty());
}

#[tokio::test]
async fn far_future_end_date_still_matches() {
  let s = store().await;
  let web = course("web", None, true);
  s.insert_course(&web).await.unwrap();
  let ada = profile("ada@example.com", Role::Student);
  s.insert_profile(&ada).await.unwrap();
  s.insert_enrollment(&enrollment(ada.id, web.id, EnrollmentStatus::Active, 10)).await.unwrap();

  let range = DateRange {
    start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
    end_date:   chrono::NaiveDate::from_ymd_opt(9999, 12, 31),
  };
  let window = resolve(Period::Month, range, at(15)).unwrap();
  let found = s
    .list_enrollments(&EnrollmentQuery { window: Some(window), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn completed_at_must_match_status() {
  let s = store().await;
  let c = course("x", None, true);
  let p = profile("x@example.com", Role::Student);
  s.insert_course(&c).await.unwrap();
  s.insert_profile(&p).await.unwrap();

  let mut bad = enrollment(p.id, c.id, EnrollmentStatus::Active, 1);
  bad.completed_at = Some(at(2));
  assert!(s.insert_enrollment(&bad).await.is_err());
}

#[tokio::test]
async fn watch_records_filter_by_course() {
  let s = store().await;
  let a = course("a", None, true);
  let b = course("b", None, true);
  s.insert_course(&a).await.unwrap();
  s.insert_course(&b).await.unwrap();
  let la = lesson(a.id, 1, true);
  let lb = lesson(b.id, 1, true);
  s.insert_lesson(&la).await.unwrap();
  s.insert_lesson(&lb).await.unwrap();
  let p = profile("w@example.com", Role::Student);
  s.insert_profile(&p).await.unwrap();

  s.insert_watch_record(&watch(p.id, la.id, 120, false, 3)).await.unwrap();
  s.insert_watch_record(&watch(p.id, la.id, 90, false, 4)).await.unwrap();
  s.insert_watch_record(&watch(p.id, lb.id, 30, false, 5)).await.unwrap();

  let for_a = s
    .list_watch_records(&WatchQuery { course_id: Some(a.id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(for_a.len(), 2);
  assert_eq!(for_a[0].watched_seconds, 120);
  assert_eq!(for_a[1].watched_seconds, 90);

  let windowed = s
    .list_watch_records(&WatchQuery {
      window: Some(TimeWindow { start: at(4), end: at(31) }),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(windowed.len(), 2);
}

// ─── Progress ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_counts_completed_published_lessons() {
  let s = store().await;
  let c = course("p", None, true);
  s.insert_course(&c).await.unwrap();
  let l1 = lesson(c.id, 1, true);
  let l2 = lesson(c.id, 2, true);
  let l3 = lesson(c.id, 3, true);
  let hidden = lesson(c.id, 4, false);
  for l in [&l1, &l2, &l3, &hidden] {
    s.insert_lesson(l).await.unwrap();
  }
  let p = profile("p@example.com", Role::Student);
  s.insert_profile(&p).await.unwrap();

  s.insert_watch_record(&watch(p.id, l1.id, 600, true, 2)).await.unwrap();
  // A duplicate completion of the same lesson counts once.
  s.insert_watch_record(&watch(p.id, l1.id, 600, true, 3)).await.unwrap();
  s.insert_watch_record(&watch(p.id, l2.id, 100, false, 3)).await.unwrap();
  s.insert_watch_record(&watch(p.id, hidden.id, 600, true, 3)).await.unwrap();

  let pct = s.progress_percent(p.id, c.id).await.unwrap();
  assert_eq!(pct, 33.33);
}

#[tokio::test]
async fn progress_without_lessons_is_zero() {
  let s = store().await;
  let c = course("empty", None, true);
  s.insert_course(&c).await.unwrap();
  assert_eq!(s.progress_percent(Uuid::new_v4(), c.id).await.unwrap(), 0.0);
}
