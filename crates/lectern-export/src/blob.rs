//! Blob storage for finished exports.
//!
//! [`BlobStorage`] is the contract the exporter writes through. [`FsBlobStore`]
//! implements it on a local directory and signs download links with a keyed
//! SHA-256 digest over `(path, expires)`.

use std::{
  future::Future,
  path::{Component, Path, PathBuf},
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt as _;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an object store that can hand out expiring links.
pub trait BlobStorage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `bytes` at `path`. An existing object at `path` is never replaced.
  fn upload<'a>(
    &'a self,
    path: &'a str,
    bytes: Bytes,
    content_type: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// A URL that grants read access to `path` until `expires_at`.
  fn create_signed_url<'a>(
    &'a self,
    path: &'a str,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Delete the object at `path`. Deleting a missing object is not an error.
  fn remove<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Filesystem store ────────────────────────────────────────────────────────

/// A [`BlobStorage`] rooted at a local directory.
///
/// Links look like `{base_url}/{path}?expires={unix}&signature={hex}`; the
/// server that owns `base_url` checks them with [`FsBlobStore::verify`].
#[derive(Clone)]
pub struct FsBlobStore {
  root:     PathBuf,
  base_url: String,
  secret:   String,
}

impl FsBlobStore {
  pub fn new(
    root: impl Into<PathBuf>,
    base_url: impl Into<String>,
    secret: impl Into<String>,
  ) -> Self {
    Self {
      root:     root.into(),
      base_url: base_url.into().trim_end_matches('/').to_owned(),
      secret:   secret.into(),
    }
  }

  /// Map a blob path onto the filesystem, refusing anything that could
  /// escape the root.
  pub fn local_path(&self, path: &str) -> Result<PathBuf> {
    let relative = Path::new(path);
    let clean = !path.is_empty()
      && !path.contains('\\')
      && relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !clean {
      return Err(Error::InvalidPath(path.to_owned()));
    }
    Ok(self.root.join(relative))
  }

  /// Hex signature for `path` valid until the unix timestamp `expires`.
  pub fn sign(&self, path: &str, expires: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.secret.as_bytes());
    hasher.update([0u8]);
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(expires.to_le_bytes());
    hex::encode(hasher.finalize())
  }

  /// Check a link's signature and expiry against `now`.
  pub fn verify(
    &self,
    path: &str,
    expires: i64,
    signature: &str,
    now: DateTime<Utc>,
  ) -> bool {
    if now.timestamp() >= expires {
      return false;
    }
    let expected = self.sign(path, expires);
    expected.len() == signature.len()
      && expected
        .bytes()
        .zip(signature.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
  }
}

impl BlobStorage for FsBlobStore {
  type Error = Error;

  async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<()> {
    let target = self.local_path(path)?;
    let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
      return Err(Error::InvalidPath(path.to_owned()));
    };
    tokio::fs::create_dir_all(parent).await?;

    // Stage under a private name, then hard-link into place: readers never see
    // a partial file and an existing object is never overwritten.
    let staging = parent.join(format!(
      ".{}.{}.partial",
      name.to_string_lossy(),
      Uuid::new_v4().simple()
    ));
    let staged = async {
      let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staging)
        .await?;
      file.write_all(&bytes).await?;
      file.sync_all().await?;
      tokio::fs::hard_link(&staging, &target).await
    }
    .await;
    tokio::fs::remove_file(&staging).await.ok();

    match staged {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
        return Err(Error::AlreadyExists(path.to_owned()));
      }
      Err(e) => return Err(e.into()),
    }

    tracing::debug!(path, content_type, size = bytes.len(), "stored blob");
    Ok(())
  }

  async fn create_signed_url(&self, path: &str, expires_at: DateTime<Utc>) -> Result<String> {
    let target = self.local_path(path)?;
    if !tokio::fs::try_exists(&target).await? {
      return Err(Error::NotFound(path.to_owned()));
    }

    let expires = expires_at.timestamp();
    let signature = self.sign(path, expires);
    Ok(format!(
      "{}/{path}?expires={expires}&signature={signature}",
      self.base_url
    ))
  }

  async fn remove(&self, path: &str) -> Result<()> {
    let target = self.local_path(path)?;
    match tokio::fs::remove_file(&target).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use chrono::TimeDelta;

  use super::*;

  fn scratch_dir() -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir()
      .join(format!("lectern-blob-test-{}-{n}", std::process::id()))
  }

  fn store() -> FsBlobStore {
    FsBlobStore::new(scratch_dir(), "http://localhost:8080/files/", "s3cret")
  }

  #[test]
  fn traversal_paths_are_rejected() {
    let s = store();
    for bad in ["", "../etc/passwd", "/abs", "a/../../b", "a\\b", "./a"] {
      assert!(matches!(s.local_path(bad), Err(Error::InvalidPath(_))), "{bad}");
    }
    assert!(s.local_path("exports/2024/06/report.csv").is_ok());
  }

  #[test]
  fn signatures_expire_and_bind_the_path() {
    let s = store();
    let now = Utc::now();
    let expires = now.timestamp() + 60;
    let sig = s.sign("exports/a.csv", expires);

    assert!(s.verify("exports/a.csv", expires, &sig, now));
    assert!(!s.verify("exports/b.csv", expires, &sig, now));
    assert!(!s.verify("exports/a.csv", expires + 1, &sig, now));
    assert!(!s.verify("exports/a.csv", expires, &sig, now + TimeDelta::seconds(61)));
  }

  #[tokio::test]
  async fn upload_sign_and_remove() {
    let s = store();
    let path = "exports/2024/06/test.csv";
    s.upload(path, Bytes::from_static(b"a,b\n1,2"), "text/csv").await.unwrap();

    let on_disk = tokio::fs::read(s.local_path(path).unwrap()).await.unwrap();
    assert_eq!(on_disk, b"a,b\n1,2");

    let expires_at = Utc::now() + TimeDelta::hours(1);
    let url = s.create_signed_url(path, expires_at).await.unwrap();
    let expected = format!(
      "http://localhost:8080/files/exports/2024/06/test.csv?expires={}&signature=",
      expires_at.timestamp()
    );
    assert!(url.starts_with(&expected), "{url}");

    s.remove(path).await.unwrap();
    s.remove(path).await.unwrap();
    assert!(matches!(
      s.create_signed_url(path, Utc::now()).await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn upload_never_replaces_an_existing_object() {
    let s = store();
    let path = "exports/2024/06/mine.csv";
    s.upload(path, Bytes::from_static(b"first"), "text/csv").await.unwrap();

    let err = s.upload(path, Bytes::from_static(b"second"), "text/csv").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));

    let on_disk = tokio::fs::read(s.local_path(path).unwrap()).await.unwrap();
    assert_eq!(on_disk, b"first");
    let mut entries = tokio::fs::read_dir(s.local_path("exports/2024/06").unwrap()).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
      names.push(entry.file_name());
    }
    assert_eq!(names, ["mine.csv"]);
  }
}
