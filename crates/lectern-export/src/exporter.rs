//! Encode, store, sign.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  BlobStorage, Error, ExportEntity, ExportFormat, Record, Result, render,
};

/// Links handed out by [`Exporter`] stay valid this long unless overridden.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What the caller gets back after a successful export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReceipt {
  pub file_url:     String,
  pub file_name:    String,
  pub file_size:    u64,
  pub record_count: usize,
  pub export_date:  DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}

/// Writes rendered exports through a [`BlobStorage`] backend.
pub struct Exporter<B> {
  blobs:    B,
  link_ttl: Duration,
}

impl<B: BlobStorage> Exporter<B> {
  pub fn new(blobs: B) -> Self {
    Self { blobs, link_ttl: DEFAULT_LINK_TTL }
  }

  pub fn with_link_ttl(mut self, ttl: Duration) -> Self {
    self.link_ttl = ttl;
    self
  }

  pub fn blobs(&self) -> &B { &self.blobs }

  /// Render `records`, upload them under `exports/<YYYY>/<MM>/<id>/` and
  /// return a signed link.
  ///
  /// `<id>` is fresh for every export, so two exports never share a path even
  /// when their names collide. When `file_name` is `None` the name is derived
  /// from `entity` and `now`. If the link cannot be signed the uploaded object
  /// is removed again.
  pub async fn export(
    &self,
    entity: ExportEntity,
    format: ExportFormat,
    file_name: Option<&str>,
    records: &[Record],
    now: DateTime<Utc>,
  ) -> Result<ExportReceipt> {
    let stem = match file_name {
      Some(name) => validate_name(name)?.to_owned(),
      None => default_name(entity, now),
    };
    let ttl = TimeDelta::from_std(self.link_ttl)
      .map_err(|e| Error::Sign(Box::new(e)))?;
    let expires_at = now + ttl;
    let bytes = render(format, records)?;
    let file_name = format!("{stem}.{}", format.extension());
    let path = format!(
      "exports/{}/{}/{file_name}",
      now.format("%Y/%m"),
      Uuid::new_v4().simple()
    );
    let file_size = bytes.len() as u64;

    self
      .blobs
      .upload(&path, Bytes::from(bytes), format.content_type())
      .await
      .map_err(|e| Error::Upload(Box::new(e)))?;

    let file_url = match self.blobs.create_signed_url(&path, expires_at).await {
      Ok(url) => url,
      Err(e) => {
        if let Err(cleanup) = self.blobs.remove(&path).await {
          tracing::warn!(path, error = %cleanup, "could not remove unsigned export");
        }
        return Err(Error::Sign(Box::new(e)));
      }
    };

    tracing::info!(%entity, %format, path, file_size, records = records.len(), "export written");

    Ok(ExportReceipt {
      file_url,
      file_name,
      file_size,
      record_count: records.len(),
      export_date: now,
      expires_at,
    })
  }
}

/// Caller-supplied names are limited to ASCII letters, digits, `_` and `-`.
fn validate_name(name: &str) -> Result<&str> {
  let ok = !name.is_empty()
    && name.len() <= 128
    && name
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
  if ok { Ok(name) } else { Err(Error::InvalidName(name.to_owned())) }
}

fn default_name(entity: ExportEntity, now: DateTime<Utc>) -> String {
  format!("{entity}_{}", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::Mutex,
  };

  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  #[derive(Debug, thiserror::Error)]
  #[error("fake blob failure")]
  struct FakeError;

  /// In-memory blob store whose signer can be made to fail.
  #[derive(Default)]
  struct FakeBlobs {
    objects:   Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_sign: bool,
  }

  impl BlobStorage for FakeBlobs {
    type Error = FakeError;

    async fn upload(
      &self,
      path: &str,
      bytes: Bytes,
      content_type: &str,
    ) -> Result<(), FakeError> {
      let mut objects = self.objects.lock().unwrap();
      if objects.contains_key(path) {
        return Err(FakeError);
      }
      objects.insert(path.to_owned(), (bytes.to_vec(), content_type.to_owned()));
      Ok(())
    }

    async fn create_signed_url(
      &self,
      path: &str,
      expires_at: DateTime<Utc>,
    ) -> Result<String, FakeError> {
      if self.fail_sign {
        return Err(FakeError);
      }
      Ok(format!("https://blobs.test/{path}?expires={}", expires_at.timestamp()))
    }

    async fn remove(&self, path: &str) -> Result<(), FakeError> {
      self.objects.lock().unwrap().remove(path);
      Ok(())
    }
  }

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 14, 5, 9).unwrap()
  }

  fn rows() -> Vec<Record> {
    vec![
      serde_json::from_value(json!({"course": "SQL", "enrolled": 3})).unwrap(),
      serde_json::from_value(json!({"course": "Rust", "enrolled": 5})).unwrap(),
    ]
  }

  #[tokio::test]
  async fn default_name_and_path() {
    let exporter = Exporter::new(FakeBlobs::default());
    let receipt = exporter
      .export(ExportEntity::UserActivity, ExportFormat::Csv, None, &rows(), now())
      .await
      .unwrap();

    assert_eq!(receipt.file_name, "user_activity_20240603_140509.csv");
    assert_eq!(receipt.record_count, 2);
    assert_eq!(receipt.file_size, "course,enrolled\nSQL,3\nRust,5".len() as u64);
    assert_eq!(receipt.expires_at - receipt.export_date, TimeDelta::hours(24));

    let objects = exporter.blobs().objects.lock().unwrap();
    let (path, (_, content_type)) = objects.iter().next().unwrap();
    assert_eq!(content_type, "text/csv");
    let dir = path
      .strip_prefix("exports/2024/06/")
      .and_then(|rest| rest.strip_suffix("/user_activity_20240603_140509.csv"))
      .unwrap();
    assert_eq!(dir.len(), 32);
    assert_eq!(
      receipt.file_url,
      format!("https://blobs.test/{path}?expires={}", receipt.expires_at.timestamp())
    );
  }

  #[tokio::test]
  async fn same_name_exports_get_separate_objects() {
    let exporter = Exporter::new(FakeBlobs::default());
    let first = exporter
      .export(ExportEntity::Progress, ExportFormat::Csv, None, &rows(), now())
      .await
      .unwrap();
    let second = exporter
      .export(ExportEntity::Progress, ExportFormat::Csv, None, &rows()[..1], now())
      .await
      .unwrap();

    assert_eq!(first.file_name, second.file_name);
    assert_ne!(first.file_url, second.file_url);
    assert_eq!(exporter.blobs().objects.lock().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn empty_json_export_is_two_bytes() {
    let exporter = Exporter::new(FakeBlobs::default());
    let receipt = exporter
      .export(ExportEntity::Analytics, ExportFormat::Json, Some("q2-report"), &[], now())
      .await
      .unwrap();
    assert_eq!(receipt.file_name, "q2-report.json");
    assert_eq!(receipt.file_size, 2);
    assert_eq!(receipt.record_count, 0);
  }

  #[tokio::test]
  async fn signing_failure_removes_the_upload() {
    let exporter = Exporter::new(FakeBlobs { fail_sign: true, ..Default::default() });
    let err = exporter
      .export(ExportEntity::Progress, ExportFormat::Csv, None, &rows(), now())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Sign(_)));
    assert!(exporter.blobs().objects.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn rejects_bad_names_and_formats() {
    let exporter = Exporter::new(FakeBlobs::default());
    let err = exporter
      .export(ExportEntity::Progress, ExportFormat::Csv, Some("../etc"), &rows(), now())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));

    let err = exporter
      .export(ExportEntity::Progress, ExportFormat::Excel, None, &rows(), now())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(ExportFormat::Excel)));
    assert!(exporter.blobs().objects.lock().unwrap().is_empty());
  }
}
