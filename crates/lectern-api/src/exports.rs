//! Handler for `POST /exports`.
//!
//! Body: [`ExportParams`]. Responds `201` with the receipt in the success
//! envelope.

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
};
use chrono::Utc;
use lectern_core::{
  access::Caller,
  store::{AnalyticsStore, ProgressCalculator},
};
use lectern_export::{BlobStorage, ExportReceipt};
use lectern_reports::{ExportParams, Outcome, ReportEngine};

use crate::error::ApiError;

/// `POST /exports`
pub async fn create<S, P, B>(
  State(engine): State<Arc<ReportEngine<S, P, B>>>,
  Extension(caller): Extension<Caller>,
  body: Result<Json<ExportParams>, JsonRejection>,
) -> Result<(StatusCode, Json<Outcome<ExportReceipt>>), ApiError>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
  B: BlobStorage + 'static,
{
  let Json(params) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let receipt = engine.export(&caller, &params, Utc::now()).await?;
  Ok((StatusCode::CREATED, Json(Outcome::ok(receipt))))
}
