//! Error types for the lectern-export crate.

use thiserror::Error;

use crate::ExportFormat;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unsupported export format: {0}")]
  UnsupportedFormat(ExportFormat),

  #[error("invalid export file name: {0:?}")]
  InvalidName(String),

  #[error("invalid blob path: {0:?}")]
  InvalidPath(String),

  #[error("blob already exists: {0}")]
  AlreadyExists(String),

  #[error("blob not found: {0}")]
  NotFound(String),

  #[error("malformed CSV at line {line}: {reason}")]
  MalformedCsv { line: usize, reason: &'static str },

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("upload failed: {0}")]
  Upload(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("could not sign download link: {0}")]
  Sign(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
