//! [`ReportEngine`] and its configuration.

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use lectern_core::{
  access::Caller,
  store::{AnalyticsStore, ProgressCalculator},
};
use lectern_export::{BlobStorage, Exporter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ReportError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Tunables for report assembly. Every field has a default, so an empty
/// `[engine]` table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Upper bound on in-flight progress lookups per report.
  pub progress_concurrency: usize,
  /// Length of the admin dashboard leaderboard.
  pub top_courses:          usize,
  pub recent_enrollments:   usize,
  pub recent_lessons:       usize,
  pub achievements:         usize,
  pub export_link_ttl_secs: u64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      progress_concurrency: 8,
      top_courses:          10,
      recent_enrollments:   5,
      recent_lessons:       10,
      achievements:         10,
      export_link_ttl_secs: 24 * 60 * 60,
    }
  }
}

// ─── Engine ───────────────────────────────────────────────────────────────────

/// Entry point for every report.
///
/// Stateless between calls: each method takes the caller, its parameters and
/// the instant the request was received, and reads everything else from the
/// store.
pub struct ReportEngine<S, P, B> {
  pub(crate) store:    Arc<S>,
  pub(crate) progress: Arc<P>,
  pub(crate) exporter: Exporter<B>,
  pub(crate) config:   EngineConfig,
}

impl<S, P, B> ReportEngine<S, P, B>
where
  S: AnalyticsStore,
  P: ProgressCalculator,
  B: BlobStorage,
{
  pub fn new(store: Arc<S>, progress: Arc<P>, blobs: B, config: EngineConfig) -> Self {
    let exporter = Exporter::new(blobs)
      .with_link_ttl(Duration::from_secs(config.export_link_ttl_secs));
    Self { store, progress, exporter, config }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn store(&self) -> &S { &self.store }

  pub fn blobs(&self) -> &B { self.exporter.blobs() }

  /// Progress for each `(student, course)` pair, in input order.
  ///
  /// At most `progress_concurrency` lookups run at once. A failed lookup is
  /// logged and counts as `0` so one bad row cannot sink the report.
  pub(crate) async fn progress_batch(&self, pairs: Vec<(Uuid, Uuid)>) -> Vec<f64> {
    let limit = self.config.progress_concurrency.max(1);
    stream::iter(pairs)
      .map(|(student_id, course_id)| {
        let progress = Arc::clone(&self.progress);
        async move {
          match progress.progress_percent(student_id, course_id).await {
            Ok(p) => p,
            Err(e) => {
              tracing::warn!(%student_id, %course_id, error = %e, "progress unavailable, using 0");
              0.0
            }
          }
        }
      })
      .buffered(limit)
      .collect()
      .await
  }
}

// ─── Access checks ────────────────────────────────────────────────────────────

pub(crate) fn require_admin(caller: &Caller) -> Result<(), ReportError> {
  if caller.is_admin() { Ok(()) } else { Err(ReportError::Forbidden) }
}

pub(crate) fn require_student_access(
  caller: &Caller,
  student_id: Uuid,
) -> Result<(), ReportError> {
  if caller.can_view_student(student_id) {
    Ok(())
  } else {
    Err(ReportError::Forbidden)
  }
}
