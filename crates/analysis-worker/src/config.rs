//! Worker configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::error::WorkerError;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Base URL of the dispatcher
    pub dispatcher_url: String,

    /// Engine executable
    pub engine_path: String,

    /// Extra arguments for the engine, whitespace separated in ENGINE_ARGS
    pub engine_args: Vec<String>,

    /// Worker loops to run, each with its own engine
    pub concurrency: usize,

    pub handshake_timeout: Duration,

    /// Slack on top of a job's time budget before the engine is killed
    pub search_grace: Duration,

    /// Pause after the dispatcher reports no work
    pub idle_delay: Duration,

    /// How long one acquire call asks the dispatcher to wait
    pub acquire_wait: Duration,

    /// Per-request HTTP timeout; must exceed `acquire_wait`
    pub http_timeout: Duration,

    pub backoff: BackoffPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            dispatcher_url: "http://localhost:8080".to_string(),
            engine_path: "/usr/local/bin/stockfish".to_string(),
            engine_args: Vec::new(),
            concurrency: 1,
            handshake_timeout: Duration::from_secs(10),
            search_grace: Duration::from_secs(10),
            idle_delay: Duration::from_secs(2),
            acquire_wait: Duration::from_secs(30),
            http_timeout: Duration::from_secs(40),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, WorkerError> {
        let defaults = Self::default();

        let engine_path = env::var("ENGINE_PATH")
            .or_else(|_| env::var("STOCKFISH_PATH"))
            .unwrap_or(defaults.engine_path);

        let engine_args = env::var("ENGINE_ARGS")
            .map(|v| v.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        // 0 means one worker per CPU
        let concurrency = match env_or("WORKER_CONCURRENCY", defaults.concurrency) {
            0 => num_cpus::get(),
            n => n,
        };

        let config = Self {
            dispatcher_url: env::var("DISPATCHER_URL").unwrap_or(defaults.dispatcher_url),
            engine_path,
            engine_args,
            concurrency,
            handshake_timeout: env_ms("HANDSHAKE_TIMEOUT_MS", defaults.handshake_timeout),
            search_grace: env_ms("SEARCH_GRACE_MS", defaults.search_grace),
            idle_delay: env_ms("IDLE_DELAY_MS", defaults.idle_delay),
            acquire_wait: env_ms("ACQUIRE_WAIT_MS", defaults.acquire_wait),
            http_timeout: env_ms("HTTP_TIMEOUT_MS", defaults.http_timeout),
            backoff: BackoffPolicy {
                base: env_ms("BACKOFF_BASE_MS", defaults.backoff.base),
                max: env_ms("BACKOFF_MAX_MS", defaults.backoff.max),
                max_attempts: env_or("BACKOFF_MAX_ATTEMPTS", defaults.backoff.max_attempts),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.dispatcher_url.is_empty() {
            return Err(WorkerError::Config("DISPATCHER_URL is empty"));
        }
        if self.engine_path.is_empty() {
            return Err(WorkerError::Config("ENGINE_PATH is empty"));
        }
        if self.http_timeout <= self.acquire_wait {
            return Err(WorkerError::Config(
                "HTTP_TIMEOUT_MS must be larger than ACQUIRE_WAIT_MS",
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_ms(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
