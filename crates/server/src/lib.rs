//! Analysis dispatcher: hands positions to pull-based engine workers and
//! aggregates their evaluations per game.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::dispatcher::Dispatcher;

/// Build the HTTP surface around a shared dispatcher.
pub fn app(dispatcher: Arc<Dispatcher>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Worker-facing
        .route("/api/jobs", post(routes::jobs::submit_job))
        .route("/api/jobs/next", get(routes::jobs::acquire_job))
        .route(
            "/api/results",
            get(routes::jobs::get_result).post(routes::jobs::submit_result),
        )
        .route("/api/queue", get(routes::jobs::list_pending))
        // Games and batches
        .route("/api/games/analyze", post(routes::games::analyze_game))
        .route("/api/batch", get(routes::batches::get_batch))
        .route("/api/batch/accuracy", get(routes::batches::get_batch_accuracy))
        // Shared state
        .layer(Extension(dispatcher))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
