//! Error type for `lectern-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] lectern_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value violates a column invariant (e.g. a negative duration).
  #[error("corrupt {column} value: {value}")]
  Corrupt { column: &'static str, value: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
