//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use lectern_reports::{Outcome, ReportError};
use thiserror::Error;

/// An error returned by an API handler.
///
/// Rendered as the failure envelope `{"success": false, "error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Report(#[from] ReportError),

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Report(e) => match e {
        ReportError::Validation(_) => StatusCode::BAD_REQUEST,
        ReportError::Forbidden => StatusCode::FORBIDDEN,
        ReportError::NotFound(_) => StatusCode::NOT_FOUND,
        ReportError::Fetch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ReportError::Export(_) => StatusCode::BAD_GATEWAY,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = match &self {
      ApiError::BadRequest(m) => m.clone(),
      ApiError::Report(e) => e.user_message(),
    };
    (self.status(), Json(Outcome::<()>::err(message))).into_response()
  }
}
