//! Analysis worker
//!
//! Pulls position jobs from the dispatcher, searches them with a local UCI
//! engine and posts the evaluations back.

pub mod backoff;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod worker;

pub use client::DispatcherClient;
pub use config::WorkerConfig;
pub use engine::{EngineState, SearchReport, UciEngine};
pub use error::WorkerError;
pub use worker::{Worker, WorkerSummary};
