use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chess_core::{AnalysisResult, Job};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::dispatcher::{Dispatcher, PendingSnapshot};
use crate::error::AppError;

#[derive(Deserialize)]
pub struct AcquireQuery {
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
pub struct ResultQuery {
    pub id: Option<String>,
}

/// POST /api/jobs
/// Queue one position outside any batch.
pub async fn submit_job(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    payload: Result<Json<Job>, JsonRejection>,
) -> Result<Json<JsonValue>, AppError> {
    let Json(job) = payload?;
    let job_id = dispatcher.submit_job(job).await?;
    Ok(Json(json!({ "job_id": job_id })))
}

/// GET /api/jobs/next?timeout_ms=...
/// Long-poll for the next job; 204 when none shows up in time.
pub async fn acquire_job(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    query: Result<Query<AcquireQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(q) = query?;
    let timeout = q.timeout_ms.map(Duration::from_millis);
    Ok(match dispatcher.acquire_job(timeout).await {
        Some(job) => Json(job).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// POST /api/results
pub async fn submit_result(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    payload: Result<Json<AnalysisResult>, JsonRejection>,
) -> Result<Json<JsonValue>, AppError> {
    let Json(result) = payload?;
    if result.job_id.is_empty() {
        return Err(AppError::BadRequest("missing job_id".into()));
    }
    let job_id = result.job_id.clone();
    let status = dispatcher.submit_result(result).await;
    Ok(Json(json!({ "job_id": job_id, "status": status })))
}

/// GET /api/results?id=...
pub async fn get_result(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    query: Result<Query<ResultQuery>, QueryRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let Query(q) = query?;
    let job_id = q
        .id
        .filter(|id| !id.is_empty())
        .ok_or(AppError::BadRequest("missing id".into()))?;
    Ok(Json(dispatcher.get_result(&job_id).await?))
}

/// GET /api/queue
pub async fn list_pending(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
) -> Json<PendingSnapshot> {
    Json(dispatcher.list_pending().await)
}
