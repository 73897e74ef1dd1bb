//! Report errors and the `{success, data}` / `{success, error}` envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a report could not be produced.
///
/// [`ReportError::user_message`] is what callers are shown; the `Display`
/// text may carry internals and is meant for logs.
#[derive(Debug, Error)]
pub enum ReportError {
  #[error("invalid parameters: {0}")]
  Validation(String),

  #[error("forbidden")]
  Forbidden,

  #[error("{0} not found")]
  NotFound(&'static str),

  #[error("failed to fetch {what}: {source}")]
  Fetch {
    what:   &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("export failed: {0}")]
  Export(#[source] lectern_export::Error),
}

impl ReportError {
  pub(crate) fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  /// The message safe to show to the caller. Store and storage details
  /// never leak through here.
  pub fn user_message(&self) -> String {
    match self {
      Self::Validation(message) => message.clone(),
      Self::Forbidden => "forbidden".to_owned(),
      Self::NotFound(entity) => format!("{entity} not found"),
      Self::Fetch { .. } => "something went wrong".to_owned(),
      Self::Export(_) => "export failed".to_owned(),
    }
  }
}

impl From<lectern_core::Error> for ReportError {
  fn from(e: lectern_core::Error) -> Self { Self::Validation(e.to_string()) }
}

impl From<lectern_export::Error> for ReportError {
  fn from(e: lectern_export::Error) -> Self {
    use lectern_export::Error as E;
    match e {
      E::UnsupportedFormat(_) | E::InvalidName(_) => Self::Validation(e.to_string()),
      other => Self::Export(other),
    }
  }
}

// ─── Envelope ─────────────────────────────────────────────────────────────────

/// Wire envelope around every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data:    Option<T>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:   Option<String>,
}

impl<T> Outcome<T> {
  pub fn ok(data: T) -> Self {
    Self { success: true, data: Some(data), error: None }
  }

  pub fn err(message: impl Into<String>) -> Self {
    Self { success: false, data: None, error: Some(message.into()) }
  }
}

impl<T> From<Result<T, ReportError>> for Outcome<T> {
  fn from(result: Result<T, ReportError>) -> Self {
    match result {
      Ok(data) => Self::ok(data),
      Err(e) => Self::err(e.user_message()),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn envelope_shapes() {
    let ok: Outcome<u32> = Ok(3).into();
    assert_eq!(serde_json::to_value(ok).unwrap(), json!({"success": true, "data": 3}));

    let err: Outcome<u32> = Err(ReportError::NotFound("course")).into();
    assert_eq!(
      serde_json::to_value(err).unwrap(),
      json!({"success": false, "error": "course not found"})
    );
  }

  #[test]
  fn internal_details_stay_internal() {
    let e = ReportError::Fetch {
      what:   "enrollments",
      source: "disk I/O error at /var/db".into(),
    };
    assert_eq!(e.user_message(), "something went wrong");
    assert!(e.to_string().contains("disk I/O"));
  }

  #[test]
  fn export_validation_errors_are_shown() {
    let e: ReportError =
      lectern_export::Error::UnsupportedFormat(lectern_export::ExportFormat::Pdf).into();
    assert_eq!(e.user_message(), "unsupported export format: pdf");
  }
}
