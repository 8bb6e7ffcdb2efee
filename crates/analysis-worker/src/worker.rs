//! Pull loop: acquire a job, run it through the engine, hand the result back.

use std::time::Duration;

use chess_core::AnalysisResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::client::DispatcherClient;
use crate::config::WorkerConfig;
use crate::engine::UciEngine;
use crate::error::WorkerError;

/// Counters reported when a worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Jobs analysed successfully
    pub analyzed: u64,
    /// Jobs answered with an error result
    pub failed: u64,
    /// Results the dispatcher refused or that could not be delivered
    pub undelivered: u64,
}

pub struct Worker {
    id: usize,
    client: DispatcherClient,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(id: usize, client: DispatcherClient, config: WorkerConfig) -> Self {
        Self { id, client, config }
    }

    /// Run until `cancel` fires or the dispatcher stays unreachable for too long.
    ///
    /// Cancellation is observed between jobs and during sleeps. A search that
    /// has started always runs to completion (or its deadline) and its result
    /// is still submitted.
    pub async fn run(&self, cancel: CancellationToken) -> Result<WorkerSummary, WorkerError> {
        let mut engine: Option<UciEngine> = None;
        let mut summary = WorkerSummary::default();

        info!(worker = self.id, dispatcher = %self.client.base_url(), "Worker started");
        let outcome = self.poll(&mut engine, &mut summary, &cancel).await;

        if let Some(engine) = engine.as_mut() {
            engine.close().await;
        }

        match &outcome {
            Ok(()) => info!(
                worker = self.id,
                analyzed = summary.analyzed,
                failed = summary.failed,
                "Worker stopped"
            ),
            Err(e) => error!(worker = self.id, error = %e, "Worker gave up"),
        }
        outcome.map(|()| summary)
    }

    async fn poll(
        &self,
        engine: &mut Option<UciEngine>,
        summary: &mut WorkerSummary,
        cancel: &CancellationToken,
    ) -> Result<(), WorkerError> {
        let mut backoff = Backoff::new(self.config.backoff.clone());

        while !cancel.is_cancelled() {
            // A timed out or crashed engine is closed; replace it before taking work
            if engine.as_ref().map_or(true, UciEngine::is_closed) {
                match self.spawn_engine().await {
                    Ok(fresh) => *engine = Some(fresh),
                    Err(e) => {
                        if self.back_off(&mut backoff, cancel, e).await? {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some(current) = engine.as_mut() else {
                continue;
            };

            let job = match self.client.acquire(self.config.acquire_wait).await {
                Ok(Some(job)) => {
                    backoff.reset();
                    job
                }
                Ok(None) => {
                    backoff.reset();
                    debug!(worker = self.id, "No work available");
                    if sleep_or_cancel(cancel, self.config.idle_delay).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    if self.back_off(&mut backoff, cancel, e).await? {
                        break;
                    }
                    continue;
                }
            };

            debug!(worker = self.id, job_id = %job.id, depth = job.depth, "Analysing");
            let result = current.analyze(&job, self.config.search_grace).await;
            if result.is_error() {
                summary.failed += 1;
            } else {
                summary.analyzed += 1;
            }

            if !self.deliver(&result, &mut backoff, cancel).await? {
                summary.undelivered += 1;
            }
        }

        Ok(())
    }

    async fn spawn_engine(&self) -> Result<UciEngine, WorkerError> {
        let engine = UciEngine::spawn(
            &self.config.engine_path,
            &self.config.engine_args,
            self.config.handshake_timeout,
        )
        .await?;
        info!(worker = self.id, path = %self.config.engine_path, "Engine ready");
        Ok(engine)
    }

    /// Submit a result, retrying transport failures. Returns whether the
    /// dispatcher accepted it.
    async fn deliver(
        &self,
        result: &AnalysisResult,
        backoff: &mut Backoff,
        cancel: &CancellationToken,
    ) -> Result<bool, WorkerError> {
        loop {
            match self.client.submit_result(result).await {
                Ok(ack) => {
                    backoff.reset();
                    debug!(worker = self.id, job_id = %ack.job_id, status = %ack.status, "Result submitted");
                    return Ok(true);
                }
                // The dispatcher rejected the body; sending it again changes nothing
                Err(WorkerError::Dispatcher { status, body }) if (400..500).contains(&status) => {
                    warn!(worker = self.id, job_id = %result.job_id, status, body = %body, "Result rejected");
                    return Ok(false);
                }
                Err(e) => {
                    if self.back_off(backoff, cancel, e).await? {
                        warn!(worker = self.id, job_id = %result.job_id, "Shutdown before result was delivered");
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Sleep for the next backoff delay. Returns `true` if cancelled meanwhile.
    async fn back_off(
        &self,
        backoff: &mut Backoff,
        cancel: &CancellationToken,
        err: WorkerError,
    ) -> Result<bool, WorkerError> {
        let Some(delay) = backoff.next_delay() else {
            return Err(WorkerError::RetriesExhausted {
                attempts: backoff.attempts(),
                last: err.to_string(),
            });
        };
        warn!(
            worker = self.id,
            error = %err,
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "Retrying"
        );
        Ok(sleep_or_cancel(cancel, delay).await)
    }
}

/// Returns `true` if cancelled before `delay` elapsed.
async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
