use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chess_core::pgn::PgnError;
use chess_core::AccuracyError;
use serde_json::json;

use crate::dispatcher::DispatchError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        let message = e.to_string();
        match e {
            DispatchError::QueueFull { .. } => AppError::Unavailable(message),
            DispatchError::DuplicateJob(_) => AppError::Conflict(message),
            DispatchError::InvalidJob(_) | DispatchError::EmptyBatch => {
                AppError::BadRequest(message)
            }
            DispatchError::BatchNotFound(_) | DispatchError::ResultNotFound(_) => {
                AppError::NotFound(message)
            }
            DispatchError::Accuracy(AccuracyError::Incomplete { .. }) => {
                AppError::Conflict(message)
            }
            DispatchError::Accuracy(_) => AppError::Unprocessable(message),
        }
    }
}

impl From<PgnError> for AppError {
    fn from(e: PgnError) -> Self {
        AppError::BadRequest(format!("invalid PGN: {e}"))
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(format!("invalid JSON: {}", e.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::BadRequest(format!("invalid query: {}", e.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Anyhow(e) => {
                tracing::error!("Unexpected error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: DispatchError) -> StatusCode {
        AppError::from(e).into_response().status()
    }

    #[test]
    fn test_dispatch_errors_map_to_status() {
        assert_eq!(
            status_of(DispatchError::QueueFull { capacity: 1 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(DispatchError::DuplicateJob("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(DispatchError::EmptyBatch), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(DispatchError::BatchNotFound("b".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DispatchError::Accuracy(AccuracyError::Incomplete {
                completed: 0,
                total: 2
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DispatchError::Accuracy(AccuracyError::InsufficientData {
                found: 1
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(DispatchError::Accuracy(AccuracyError::NoComputablePairs)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
