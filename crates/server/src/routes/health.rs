use std::sync::Arc;

use axum::{Extension, Json};
use serde_json::{json, Value as JsonValue};

use crate::dispatcher::Dispatcher;

/// GET /health
pub async fn health_check(Extension(dispatcher): Extension<Arc<Dispatcher>>) -> Json<JsonValue> {
    let stats = dispatcher.stats().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "dispatcher": stats,
    }))
}
