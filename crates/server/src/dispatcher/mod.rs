//! Job dispatch and batch aggregation.
//!
//! [`Dispatcher`] owns the pending jobs and all batches behind one
//! read/write lock. Request handlers share it through an `Arc`; status
//! queries take the read lock, everything that mutates takes the write lock.
//! Workers blocked in [`Dispatcher::acquire_job`] wait on a [`Notify`]
//! without holding the lock.

pub mod batch_tracker;
pub mod job_store;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chess_core::pgn::side_to_move;
use chess_core::{accuracy, job_id, AccuracyError, AccuracyReport, AnalysisResult, Color, Job};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DispatcherConfig;
use batch_tracker::{BatchTracker, RecordOutcome};
use job_store::{JobStore, QueueFull};

#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("job queue full (capacity {capacity}), try again later")]
    QueueFull { capacity: usize },

    #[error("job {0} already exists")]
    DuplicateJob(String),

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("game contains no positions to analyze")]
    EmptyBatch,

    #[error("batch not found")]
    BatchNotFound(String),

    #[error("result not found")]
    ResultNotFound(String),

    #[error(transparent)]
    Accuracy(#[from] AccuracyError),
}

impl From<QueueFull> for DispatchError {
    fn from(e: QueueFull) -> Self {
        DispatchError::QueueFull {
            capacity: e.capacity,
        }
    }
}

/// Search limits applied to every job of a submitted game.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchLimits {
    pub depth: Option<u32>,
    pub time_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchTicket {
    pub batch_id: String,
    pub move_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchStatus {
    pub batch_id: String,
    pub completed: usize,
    pub total: usize,
    /// Fraction in [0, 1]
    pub progress: f64,
    pub results: HashMap<String, AnalysisResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingSnapshot {
    /// Jobs without a result (queued or in flight)
    pub queue_length: usize,
    /// Jobs not yet handed to a worker
    pub queued: usize,
    pub pending_jobs: Vec<Job>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Recorded,
    Duplicate,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchStats {
    pub queued: usize,
    pub pending: usize,
    pub capacity: usize,
    pub batches: usize,
    pub standalone_results: usize,
}

struct DispatchState {
    jobs: JobStore,
    batches: BatchTracker,
    /// Results of jobs submitted on their own, keyed by job id
    standalone: HashMap<String, AnalysisResult>,
}

impl DispatchState {
    fn knows(&self, job_id: &str) -> bool {
        self.jobs.contains(job_id)
            || self.batches.owns(job_id)
            || self.standalone.contains_key(job_id)
    }
}

pub struct Dispatcher {
    config: DispatcherConfig,
    state: RwLock<DispatchState>,
    job_ready: Notify,
    next_seq: AtomicU64,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        let state = DispatchState {
            jobs: JobStore::new(config.queue_capacity),
            batches: BatchTracker::new(),
            standalone: HashMap::new(),
        };
        Self {
            config,
            state: RwLock::new(state),
            job_ready: Notify::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    fn next_id(&self, prefix: &str) -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}_{nanos}_{seq}")
    }

    /// Decompose a game into one job per position and track them as a batch.
    ///
    /// Either every job is queued or none is: a game that does not fit in
    /// the queue is rejected as a whole.
    pub async fn submit_analysis_request(
        &self,
        positions: Vec<String>,
        limits: SearchLimits,
    ) -> Result<BatchTicket, DispatchError> {
        if positions.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }
        let mut first_mover = Color::White;
        for (ply, fen) in positions.iter().enumerate() {
            let turn = side_to_move(fen)
                .map_err(|e| DispatchError::InvalidJob(format!("position {ply}: {e}")))?;
            if ply == 0 {
                first_mover = turn;
            }
        }

        let batch_id = self.next_id("batch");
        let depth = limits.depth.unwrap_or(self.config.game_depth);
        let time_ms = limits.time_ms.unwrap_or(self.config.game_time_ms);

        let jobs: Vec<Job> = positions
            .into_iter()
            .enumerate()
            .map(|(ply, fen)| Job {
                id: job_id(&batch_id, ply),
                fen,
                depth,
                time_ms,
                priority: 0,
            })
            .collect();
        let move_count = jobs.len();

        {
            let mut state = self.state.write().await;
            if !state.jobs.has_room(move_count) {
                warn!(
                    move_count,
                    queued = state.jobs.queued_len(),
                    "Job queue full, rejecting game"
                );
                return Err(DispatchError::QueueFull {
                    capacity: state.jobs.capacity(),
                });
            }

            let job_ids = jobs.iter().map(|j| j.id.clone()).collect();
            state.batches.create_batch(&batch_id, job_ids, first_mover);
            for job in jobs {
                state.jobs.submit(job)?;
            }
        }
        self.job_ready.notify_waiters();

        info!(batch_id = %batch_id, move_count, "Batch created");
        Ok(BatchTicket {
            batch_id,
            move_count,
        })
    }

    /// Queue a single job outside any batch, filling unset limits with defaults.
    pub async fn submit_job(&self, mut job: Job) -> Result<String, DispatchError> {
        if job.fen.trim().is_empty() {
            return Err(DispatchError::InvalidJob("missing position".into()));
        }
        side_to_move(&job.fen).map_err(|e| DispatchError::InvalidJob(e.to_string()))?;
        if job.id.is_empty() {
            job.id = self.next_id("job");
        }
        if job.depth == 0 {
            job.depth = self.config.job_depth;
        }
        if job.time_ms == 0 {
            job.time_ms = self.config.job_time_ms;
        }

        let job_id = job.id.clone();
        {
            let mut state = self.state.write().await;
            if state.knows(&job_id) {
                return Err(DispatchError::DuplicateJob(job_id));
            }
            if let Err(e) = state.jobs.submit(job) {
                warn!(job_id = %job_id, capacity = e.capacity, "Job queue full, rejecting job");
                return Err(e.into());
            }
        }
        self.job_ready.notify_waiters();

        info!(job_id = %job_id, "Added job to queue");
        Ok(job_id)
    }

    /// Wait up to `timeout` (default from config, capped) for the next job.
    pub async fn acquire_job(&self, timeout: Option<Duration>) -> Option<Job> {
        let timeout = timeout
            .unwrap_or(self.config.acquire_timeout)
            .min(self.config.max_acquire_timeout);
        let deadline = Instant::now() + timeout;

        loop {
            // Register interest before looking so a submit in between is not missed.
            let notified = self.job_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.state.write().await.jobs.pop();
            if let Some(job) = next {
                debug!(job_id = %job.id, "Job handed out");
                return Some(job);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Accept a worker's result: route it to its batch and retire the job.
    pub async fn submit_result(&self, result: AnalysisResult) -> SubmitOutcome {
        let mut state = self.state.write().await;
        let was_pending = state.jobs.release(&result.job_id).is_some();

        if let Some(error) = &result.error {
            warn!(job_id = %result.job_id, error = %error, "Job failed");
        }

        match state.batches.record_result(result.clone()) {
            RecordOutcome::Recorded {
                batch_id,
                completed,
                total,
            } => {
                info!(batch_id = %batch_id, completed, total, "Batch progress");
                SubmitOutcome::Recorded
            }
            RecordOutcome::Duplicate => {
                debug!(job_id = %result.job_id, "Duplicate result ignored");
                SubmitOutcome::Duplicate
            }
            RecordOutcome::NotBatched if was_pending => {
                info!(
                    job_id = %result.job_id,
                    best_move = %result.best_move,
                    eval = result.eval,
                    "Received result"
                );
                state.standalone.insert(result.job_id.clone(), result);
                SubmitOutcome::Recorded
            }
            RecordOutcome::NotBatched if state.standalone.contains_key(&result.job_id) => {
                debug!(job_id = %result.job_id, "Duplicate result ignored");
                SubmitOutcome::Duplicate
            }
            RecordOutcome::NotBatched => {
                warn!(job_id = %result.job_id, "Result for unknown job dropped");
                SubmitOutcome::Unknown
            }
        }
    }

    pub async fn batch_status(&self, batch_id: &str) -> Result<BatchStatus, DispatchError> {
        let state = self.state.read().await;
        let batch = state
            .batches
            .get(batch_id)
            .ok_or_else(|| DispatchError::BatchNotFound(batch_id.to_string()))?;

        Ok(BatchStatus {
            batch_id: batch.id.clone(),
            completed: batch.completed,
            total: batch.total,
            progress: batch.progress(),
            results: batch.results.clone(),
        })
    }

    pub async fn batch_accuracy(&self, batch_id: &str) -> Result<AccuracyReport, DispatchError> {
        let state = self.state.read().await;
        let batch = state
            .batches
            .get(batch_id)
            .ok_or_else(|| DispatchError::BatchNotFound(batch_id.to_string()))?;
        Ok(accuracy::batch_accuracy(batch)?)
    }

    pub async fn get_result(&self, job_id: &str) -> Result<AnalysisResult, DispatchError> {
        let state = self.state.read().await;
        state
            .standalone
            .get(job_id)
            .or_else(|| state.batches.result_for(job_id))
            .cloned()
            .ok_or_else(|| DispatchError::ResultNotFound(job_id.to_string()))
    }

    pub async fn list_pending(&self) -> PendingSnapshot {
        let state = self.state.read().await;
        PendingSnapshot {
            queue_length: state.jobs.pending_len(),
            queued: state.jobs.queued_len(),
            pending_jobs: state.jobs.pending_jobs(),
        }
    }

    pub async fn stats(&self) -> DispatchStats {
        let state = self.state.read().await;
        DispatchStats {
            queued: state.jobs.queued_len(),
            pending: state.jobs.pending_len(),
            capacity: state.jobs.capacity(),
            batches: state.batches.len(),
            standalone_results: state.standalone.len(),
        }
    }
}
