use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub dispatch: DispatcherConfig,
}

/// Tunables of the job store and of job decomposition.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Maximum number of jobs waiting for delivery
    pub queue_capacity: usize,
    /// How long an acquire waits when the caller does not say
    pub acquire_timeout: Duration,
    /// Upper bound on a caller-supplied acquire timeout
    pub max_acquire_timeout: Duration,
    /// Search limits for jobs decomposed from a game
    pub game_depth: u32,
    pub game_time_ms: u64,
    /// Defaults for directly submitted jobs that leave limits unset
    pub job_depth: u32,
    pub job_time_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            acquire_timeout: Duration::from_secs(5),
            max_acquire_timeout: Duration::from_secs(30),
            game_depth: 25,
            game_time_ms: 5000,
            job_depth: 15,
            job_time_ms: 5000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = DispatcherConfig::default();
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8080),
            dispatch: DispatcherConfig {
                queue_capacity: env_or("QUEUE_CAPACITY", defaults.queue_capacity),
                acquire_timeout: Duration::from_millis(env_or(
                    "ACQUIRE_TIMEOUT_MS",
                    defaults.acquire_timeout.as_millis() as u64,
                )),
                max_acquire_timeout: Duration::from_millis(env_or(
                    "MAX_ACQUIRE_TIMEOUT_MS",
                    defaults.max_acquire_timeout.as_millis() as u64,
                )),
                game_depth: env_or("GAME_DEPTH", defaults.game_depth),
                game_time_ms: env_or("GAME_TIME_MS", defaults.game_time_ms),
                job_depth: env_or("JOB_DEPTH", defaults.job_depth),
                job_time_ms: env_or("JOB_TIME_MS", defaults.job_time_ms),
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
