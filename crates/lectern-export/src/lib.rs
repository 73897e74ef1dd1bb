//! Report export for Lectern.
//!
//! Turns a flat list of records into CSV or JSON bytes, stores them through a
//! [`BlobStorage`] backend and hands back an expiring download link. The
//! codecs are pure and synchronous; only [`Exporter`] touches storage.
//!
//! # Quick start
//!
//! ```no_run
//! use lectern_export::{ExportFormat, Record, render};
//!
//! let mut row = Record::new();
//! row.insert("course".into(), "Intro to SQL".into());
//! row.insert("enrollments".into(), 12.into());
//! let bytes = render(ExportFormat::Csv, &[row]).unwrap();
//! assert_eq!(bytes, b"course,enrollments\nIntro to SQL,12");
//! ```

#![allow(async_fn_in_trait)]

pub mod blob;
pub mod error;
mod exporter;
mod parse;
mod serialize;

pub use blob::{BlobStorage, FsBlobStore};
pub use error::{Error, Result};
pub use exporter::{DEFAULT_LINK_TTL, ExportReceipt, Exporter};
pub use parse::{parse_csv, parse_records};
pub use serialize::{to_csv, to_json};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One flat export row; keys keep their insertion order.
pub type Record = serde_json::Map<String, serde_json::Value>;

// ─── Public types ─────────────────────────────────────────────────────────────

/// Output encoding requested by the caller.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
  #[default]
  Csv,
  Json,
  /// Recognised so callers get a clear rejection; not produced.
  Excel,
  /// Recognised so callers get a clear rejection; not produced.
  Pdf,
}

impl ExportFormat {
  pub fn extension(self) -> &'static str {
    match self {
      Self::Csv => "csv",
      Self::Json => "json",
      Self::Excel => "xlsx",
      Self::Pdf => "pdf",
    }
  }

  pub fn content_type(self) -> &'static str {
    match self {
      Self::Csv => "text/csv",
      Self::Json => "application/json",
      Self::Excel => {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
      }
      Self::Pdf => "application/pdf",
    }
  }
}

/// Which kind of data an export carries.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExportEntity {
  Enrollments,
  Progress,
  Analytics,
  UserActivity,
}

// ─── Public API ───────────────────────────────────────────────────────────────

/// Encode `records` in `format`.
///
/// An empty record list yields zero bytes for CSV and `[]` for JSON.
pub fn render(format: ExportFormat, records: &[Record]) -> Result<Vec<u8>> {
  match format {
    ExportFormat::Csv => Ok(to_csv(records).into_bytes()),
    ExportFormat::Json => to_json(records),
    other => Err(Error::UnsupportedFormat(other)),
  }
}
