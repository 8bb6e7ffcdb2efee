//! Per-side accuracy from a completed batch of evaluations. Pure functions only.

use std::collections::BTreeMap;

use serde::Serialize;
use shakmaty::Color;
use thiserror::Error;

use crate::models::{ply_index, Batch};

/// Average centipawn loss that drops accuracy by a factor of e.
const ACCURACY_SCALE: f64 = 80.0;

#[derive(Debug, Error, PartialEq)]
pub enum AccuracyError {
    #[error("batch not completed yet ({completed}/{total})")]
    Incomplete { completed: usize, total: usize },

    #[error("not enough eval data to compute accuracy ({found} evaluations)")]
    InsufficientData { found: usize },

    #[error("could not compute accuracy from available eval pairs")]
    NoComputablePairs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub batch_id: String,
    pub white_accuracy: f64,
    pub black_accuracy: f64,
    pub white_avg_cpl: f64,
    pub black_avg_cpl: f64,
    pub white_moves: u32,
    pub black_moves: u32,
}

pub fn accuracy_from_avg_loss(avg_loss: f64) -> f64 {
    100.0 * (-avg_loss / ACCURACY_SCALE).exp()
}

/// Compute per-side centipawn loss and accuracy for a finished batch.
///
/// Evaluations are side-to-move relative, so plies where Black is to move
/// are negated to get a White-centric series before differencing. Ply 0 is
/// White's move unless the batch says otherwise.
pub fn batch_accuracy(batch: &Batch) -> Result<AccuracyReport, AccuracyError> {
    if !batch.is_complete() {
        return Err(AccuracyError::Incomplete {
            completed: batch.completed,
            total: batch.total,
        });
    }

    let evals: BTreeMap<usize, f64> = batch
        .results
        .iter()
        .filter(|(_, res)| !res.is_error())
        .filter_map(|(job_id, res)| {
            let ply = ply_index(job_id)?;
            let raw = res.eval as f64;
            let white_centric = match batch.mover_at(ply) {
                Color::White => raw,
                Color::Black => -raw,
            };
            Some((ply, white_centric))
        })
        .collect();

    if evals.len() < 2 {
        return Err(AccuracyError::InsufficientData { found: evals.len() });
    }

    let mut white_loss_sum = 0.0;
    let mut black_loss_sum = 0.0;
    let mut white_moves = 0u32;
    let mut black_moves = 0u32;

    for (&ply, &before) in &evals {
        let Some(&after) = evals.get(&(ply + 1)) else {
            continue;
        };
        match batch.mover_at(ply) {
            Color::White => {
                white_loss_sum += (before - after).max(0.0);
                white_moves += 1;
            }
            Color::Black => {
                black_loss_sum += (after - before).max(0.0);
                black_moves += 1;
            }
        }
    }

    if white_moves == 0 && black_moves == 0 {
        return Err(AccuracyError::NoComputablePairs);
    }

    let white_avg_cpl = average(white_loss_sum, white_moves);
    let black_avg_cpl = average(black_loss_sum, black_moves);

    Ok(AccuracyReport {
        batch_id: batch.id.clone(),
        white_accuracy: accuracy_from_avg_loss(white_avg_cpl),
        black_accuracy: accuracy_from_avg_loss(black_avg_cpl),
        white_avg_cpl,
        black_avg_cpl,
        white_moves,
        black_moves,
    })
}

fn average(sum: f64, count: u32) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
