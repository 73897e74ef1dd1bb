//! Error types for `lectern-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("window start {start} is not before its end {end}")]
  EmptyWindow {
    start: DateTime<Utc>,
    end:   DateTime<Utc>,
  },

  #[error("unknown {kind}: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
