use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Suffix joining a batch id and a ply index inside a job id.
const MOVE_SEPARATOR: &str = "_move_";

static PLY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_move_(\d+)$").expect("valid ply suffix pattern"));

/// One position to analyse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: String,
    /// Position in FEN notation
    #[serde(alias = "position")]
    pub fen: String,
    #[serde(default)]
    pub depth: u32,
    /// Search budget in milliseconds
    #[serde(default)]
    pub time_ms: u64,
    #[serde(default)]
    pub priority: i32,
}

/// Engine output for one job.
///
/// `eval` is in centipawns from the side to move's point of view. When the
/// engine reports a forced mate, `mate` carries the distance in moves and
/// `eval` holds a saturated centipawn equivalent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub job_id: String,
    #[serde(default)]
    pub best_move: String,
    #[serde(default)]
    pub eval: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mate: Option<i32>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub nodes: u64,
    #[serde(default, rename = "nodes_per_s")]
    pub nodes_per_second: u64,
    /// Principal variation, space separated UCI moves
    #[serde(default)]
    pub pv: String,
    #[serde(default)]
    pub time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// A result standing in for an analysis that could not be carried out.
    pub fn failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// All jobs decomposed from one game, tracked as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub job_ids: Vec<String>,
    pub results: HashMap<String, AnalysisResult>,
    pub completed: usize,
    pub total: usize,
    /// Whether ply 0 is a White move. False for games set up with Black to move.
    #[serde(default = "white_first_default")]
    pub white_first: bool,
}

fn white_first_default() -> bool {
    true
}

impl Batch {
    pub fn new(id: impl Into<String>, job_ids: Vec<String>) -> Self {
        let total = job_ids.len();
        Self {
            id: id.into(),
            job_ids,
            results: HashMap::with_capacity(total),
            completed: 0,
            total,
            white_first: true,
        }
    }

    pub fn with_first_mover(mut self, color: Color) -> Self {
        self.white_first = color.is_white();
        self
    }

    /// Side that plays ply `ply`.
    pub fn mover_at(&self, ply: usize) -> Color {
        if (ply % 2 == 0) == self.white_first {
            Color::White
        } else {
            Color::Black
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Completion in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Build the id of the job analysing ply `ply` of batch `batch_id`.
pub fn job_id(batch_id: &str, ply: usize) -> String {
    format!("{batch_id}{MOVE_SEPARATOR}{ply}")
}

/// Recover the zero-based ply index encoded in a batch job id.
pub fn ply_index(job_id: &str) -> Option<usize> {
    PLY_SUFFIX
        .captures(job_id)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
