//! Store reads as seen by the reports.
//!
//! Every read goes through [`fetch`], which names the read, logs a failure
//! once, and turns it into [`ReportError::Fetch`].

use std::future::Future;

use crate::ReportError;

pub(crate) async fn fetch<T, E>(
  what: &'static str,
  read: impl Future<Output = Result<T, E>>,
) -> Result<T, ReportError>
where
  E: std::error::Error + Send + Sync + 'static,
{
  match read.await {
    Ok(value) => Ok(value),
    Err(e) => {
      tracing::error!(fetch = what, error = %e, "store read failed");
      Err(ReportError::Fetch { what, source: Box::new(e) })
    }
  }
}

/// A read that only runs when `wanted`; otherwise resolves to `None`.
pub(crate) async fn fetch_if<T, E>(
  wanted: bool,
  what: &'static str,
  read: impl Future<Output = Result<T, E>>,
) -> Result<Option<T>, ReportError>
where
  E: std::error::Error + Send + Sync + 'static,
{
  if wanted { fetch(what, read).await.map(Some) } else { Ok(None) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, thiserror::Error)]
  #[error("connection reset")]
  struct Broken;

  #[tokio::test]
  async fn failures_name_the_read() {
    let err = fetch::<(), _>("lessons", async { Err(Broken) }).await.unwrap_err();
    match err {
      ReportError::Fetch { what, source } => {
        assert_eq!(what, "lessons");
        assert_eq!(source.to_string(), "connection reset");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn skipped_reads_do_not_run() {
    let skipped = fetch_if::<u8, Broken>(false, "profiles", async { Err(Broken) }).await;
    assert!(matches!(skipped, Ok(None)));
    let ran = fetch_if::<u8, Broken>(true, "profiles", async { Ok(7) }).await;
    assert!(matches!(ran, Ok(Some(7))));
  }
}
