//! Catalog types: categories, courses and their lessons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A course category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
  pub id:   Uuid,
  pub name: String,
}

/// A course in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
  pub id:           Uuid,
  pub title:        String,
  pub slug:         String,
  pub category_id:  Option<Uuid>,
  pub is_published: bool,
  pub created_at:   DateTime<Utc>,
}

/// A single video lesson inside a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
  pub id:               Uuid,
  pub course_id:        Uuid,
  pub title:            String,
  /// 1-based position inside the course; unique per course.
  pub order_index:      u32,
  pub duration_seconds: Option<u32>,
  pub is_published:     bool,
}
