use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query},
    Extension, Json,
};
use chess_core::AccuracyReport;
use serde::Deserialize;

use crate::dispatcher::{BatchStatus, Dispatcher};
use crate::error::AppError;

#[derive(Deserialize)]
pub struct BatchQuery {
    pub id: Option<String>,
}

#[derive(Deserialize)]
pub struct AccuracyQuery {
    pub batch_id: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing {name}")))
}

/// GET /api/batch?id=...
pub async fn get_batch(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    query: Result<Query<BatchQuery>, QueryRejection>,
) -> Result<Json<BatchStatus>, AppError> {
    let Query(q) = query?;
    let batch_id = required(q.id, "id")?;
    Ok(Json(dispatcher.batch_status(&batch_id).await?))
}

/// GET /api/batch/accuracy?batch_id=...
/// Per-side average centipawn loss and accuracy; the batch must be complete.
pub async fn get_batch_accuracy(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    query: Result<Query<AccuracyQuery>, QueryRejection>,
) -> Result<Json<AccuracyReport>, AppError> {
    let Query(q) = query?;
    let batch_id = required(q.batch_id, "batch_id")?;
    Ok(Json(dispatcher.batch_accuracy(&batch_id).await?))
}
