//! The identity a report is computed for.
//!
//! Authentication happens elsewhere; by the time a [`Caller`] exists the
//! request has been classified as an admin or a student.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::Role;

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
  pub id:   Uuid,
  pub role: Role,
}

impl Caller {
  pub fn admin(id: Uuid) -> Self { Self { id, role: Role::Admin } }

  pub fn student(id: Uuid) -> Self { Self { id, role: Role::Student } }

  pub fn is_admin(&self) -> bool { self.role == Role::Admin }

  /// Admins may see every student; students only themselves.
  pub fn can_view_student(&self, student_id: Uuid) -> bool {
    self.is_admin() || self.id == student_id
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn students_only_see_themselves() {
    let me = Uuid::new_v4();
    let other = Uuid::new_v4();
    assert!(Caller::student(me).can_view_student(me));
    assert!(!Caller::student(me).can_view_student(other));
    assert!(Caller::admin(me).can_view_student(other));
  }
}
