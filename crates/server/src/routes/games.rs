use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, Extension, Json};
use chess_core::pgn;
use serde::Deserialize;

use crate::dispatcher::{BatchTicket, Dispatcher, SearchLimits};
use crate::error::AppError;

#[derive(Deserialize)]
pub struct AnalyzeGameBody {
    /// PGN or bare SAN movetext, e.g. "e4 e5 Nf3 Nf6"
    pub pgn: Option<String>,
    /// Positions to analyze directly, in ply order
    pub positions: Option<Vec<String>>,
    pub depth: Option<u32>,
    pub time_ms: Option<u64>,
}

/// POST /api/games/analyze
/// Decompose a game into one job per ply and return the batch to poll.
pub async fn analyze_game(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    payload: Result<Json<AnalyzeGameBody>, JsonRejection>,
) -> Result<Json<BatchTicket>, AppError> {
    let Json(body) = payload?;

    let positions = match (body.pgn, body.positions) {
        (Some(text), None) => pgn::positions_from_pgn(&text)?,
        (None, Some(positions)) => positions,
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "provide either pgn or positions, not both".into(),
            ))
        }
        (None, None) => return Err(AppError::BadRequest("missing pgn".into())),
    };

    tracing::debug!(plies = positions.len(), "Decomposed game");

    let limits = SearchLimits {
        depth: body.depth.filter(|d| *d > 0),
        time_ms: body.time_ms.filter(|t| *t > 0),
    };
    let ticket = dispatcher.submit_analysis_request(positions, limits).await?;
    Ok(Json(ticket))
}
