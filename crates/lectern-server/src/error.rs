//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use lectern_reports::Outcome;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("forbidden")]
  Forbidden,
  #[error("not found")]
  NotFound,
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::Forbidden => StatusCode::FORBIDDEN,
      Error::NotFound => StatusCode::NOT_FOUND,
      Error::Store(e) => {
        tracing::error!(error = %e, "profile lookup failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Error::Io(e) => {
        tracing::error!(error = %e, "reading export failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let message = match &self {
      Error::Store(_) | Error::Io(_) => "something went wrong".to_owned(),
      other => other.to_string(),
    };

    let mut res = (status, Json(Outcome::<()>::err(message))).into_response();
    if matches!(self, Error::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"lectern\""),
      );
    }
    res
  }
}
