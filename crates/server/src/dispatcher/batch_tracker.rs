//! Batches of jobs decomposed from one game, and the results collected for them.

use std::collections::HashMap;

use chess_core::{AnalysisResult, Batch, Color};

/// What happened to a result offered to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded {
        batch_id: String,
        completed: usize,
        total: usize,
    },
    /// The job already has a result; nothing changed.
    Duplicate,
    /// The job does not belong to any batch.
    NotBatched,
}

#[derive(Default)]
pub struct BatchTracker {
    batches: HashMap<String, Batch>,
    /// job id -> owning batch id
    owners: HashMap<String, String>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new batch. `first_mover` is the side playing ply 0.
    pub fn create_batch(
        &mut self,
        batch_id: &str,
        job_ids: Vec<String>,
        first_mover: Color,
    ) -> &Batch {
        for job_id in &job_ids {
            self.owners.insert(job_id.clone(), batch_id.to_string());
        }
        self.batches
            .entry(batch_id.to_string())
            .or_insert_with(|| Batch::new(batch_id, job_ids).with_first_mover(first_mover))
    }

    pub fn record_result(&mut self, result: AnalysisResult) -> RecordOutcome {
        let Some(batch) = self
            .owners
            .get(&result.job_id)
            .and_then(|batch_id| self.batches.get_mut(batch_id))
        else {
            return RecordOutcome::NotBatched;
        };

        if batch.results.contains_key(&result.job_id) {
            return RecordOutcome::Duplicate;
        }

        batch.results.insert(result.job_id.clone(), result);
        batch.completed += 1;

        RecordOutcome::Recorded {
            batch_id: batch.id.clone(),
            completed: batch.completed,
            total: batch.total,
        }
    }

    pub fn get(&self, batch_id: &str) -> Option<&Batch> {
        self.batches.get(batch_id)
    }

    pub fn owns(&self, job_id: &str) -> bool {
        self.owners.contains_key(job_id)
    }

    /// Result recorded for a batched job, if any.
    pub fn result_for(&self, job_id: &str) -> Option<&AnalysisResult> {
        let batch_id = self.owners.get(job_id)?;
        self.batches.get(batch_id)?.results.get(job_id)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
