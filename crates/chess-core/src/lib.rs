//! Shared data model and pure algorithms for distributed position analysis.

pub mod accuracy;
pub mod models;
pub mod pgn;

pub use accuracy::{batch_accuracy, AccuracyError, AccuracyReport};
pub use models::{job_id, ply_index, AnalysisResult, Batch, Job};
pub use shakmaty::Color;
