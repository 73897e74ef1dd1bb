//! Profiles: the users the engine reports on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// What a profile is allowed to see.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Student,
  Admin,
}

/// A user account as seen by the reporting layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub id:         Uuid,
  pub full_name:  Option<String>,
  pub email:      String,
  pub role:       Role,
  pub created_at: DateTime<Utc>,
}

impl Profile {
  /// The name shown in reports; falls back to the email address.
  pub fn display_name(&self) -> &str {
    self.full_name.as_deref().unwrap_or(&self.email)
  }
}
