//! Worker error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Engine timed out during {phase} after {after_ms}ms")]
    EngineTimeout { phase: &'static str, after_ms: u64 },

    #[error("Engine is {actual}, cannot {operation}")]
    EngineState {
        actual: &'static str,
        operation: &'static str,
    },

    #[error("Engine is closed")]
    EngineClosed,

    #[error("Dispatcher request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Dispatcher returned {status}: {body}")]
    Dispatcher { status: u16, body: String },

    #[error("Giving up after {attempts} consecutive failures, last: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}
