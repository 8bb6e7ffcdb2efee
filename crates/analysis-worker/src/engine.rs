//! UCI engine bridge over a child process (async I/O)
//!
//! One [`UciEngine`] drives one engine subprocess strictly sequentially.
//! Every call that waits on the engine runs under a deadline; when the
//! deadline passes the process is killed and the bridge is closed for good.

use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use chess_core::{AnalysisResult, Job};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::WorkerError;

/// How long `close` waits for the engine to exit after `quit`.
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Centipawn magnitude standing in for "mate in 0".
const MATE_SCORE: i32 = 10_000;

/// Longest mate distance that still maps to a distinct score.
const MAX_MATE_DISTANCE: i32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Handshaking,
    Ready,
    Analyzing,
    Closed,
}

impl EngineState {
    fn name(self) -> &'static str {
        match self {
            EngineState::Handshaking => "handshaking",
            EngineState::Ready => "ready",
            EngineState::Analyzing => "analyzing",
            EngineState::Closed => "closed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the engine reported for one search. Later `info` lines overwrite
/// earlier values field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchReport {
    pub best_move: String,
    /// Centipawns, side to move
    pub cp: Option<i32>,
    /// Mate in N (negative: side to move gets mated)
    pub mate: Option<i32>,
    pub depth: u32,
    pub nodes: u64,
    pub nps: u64,
    pub pv: String,
    pub time_ms: u64,
}

impl SearchReport {
    /// Fold one `info ...` line into the report.
    pub fn apply_info(&mut self, line: &str) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mut i = 1;
        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    if let Some(v) = parse_at(&parts, i + 1) {
                        self.depth = v;
                    }
                    i += 2;
                }
                "nodes" => {
                    if let Some(v) = parse_at(&parts, i + 1) {
                        self.nodes = v;
                    }
                    i += 2;
                }
                "nps" => {
                    if let Some(v) = parse_at(&parts, i + 1) {
                        self.nps = v;
                    }
                    i += 2;
                }
                "score" => {
                    match parts.get(i + 1).copied() {
                        Some("cp") => {
                            if let Some(cp) = parse_at(&parts, i + 2) {
                                self.cp = Some(cp);
                                self.mate = None;
                            }
                        }
                        Some("mate") => {
                            if let Some(mate) = parse_at(&parts, i + 2) {
                                self.mate = Some(mate);
                                self.cp = None;
                            }
                        }
                        _ => {}
                    }
                    i += 3;
                }
                // PV runs to the end of the line
                "pv" => {
                    self.pv = parts[i + 1..].join(" ");
                    break;
                }
                // Free text, nothing recognisable follows
                "string" => break,
                _ => i += 1,
            }
        }
    }

    /// Centipawn evaluation, with mate scores saturated.
    pub fn eval(&self) -> i32 {
        match (self.mate, self.cp) {
            (Some(m), _) => mate_to_cp(m),
            (None, Some(cp)) => cp,
            (None, None) => 0,
        }
    }

    pub fn into_result(self, job_id: &str) -> AnalysisResult {
        AnalysisResult {
            job_id: job_id.to_string(),
            eval: self.eval(),
            mate: self.mate,
            best_move: self.best_move,
            depth: self.depth,
            nodes: self.nodes,
            nodes_per_second: self.nps,
            pv: self.pv,
            time_ms: self.time_ms,
            error: None,
        }
    }
}

fn parse_at<T: std::str::FromStr>(parts: &[&str], i: usize) -> Option<T> {
    parts.get(i).and_then(|v| v.parse().ok())
}

/// Mate in N as a centipawn score that sorts beyond any material evaluation.
pub fn mate_to_cp(mate: i32) -> i32 {
    let mate = mate.clamp(-MAX_MATE_DISTANCE, MAX_MATE_DISTANCE);
    if mate > 0 {
        MATE_SCORE - mate * 10
    } else {
        -MATE_SCORE - mate * 10
    }
}

/// Move token of a `bestmove <move> [ponder <move>]` line.
fn parse_best_move(line: &str) -> String {
    line.split_whitespace().nth(1).unwrap_or_default().to_string()
}

/// A UCI engine subprocess
pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    state: EngineState,
}

impl UciEngine {
    /// Spawn an engine and complete the UCI handshake within `handshake_timeout`.
    pub async fn spawn(
        program: &str,
        args: &[String],
        handshake_timeout: Duration,
    ) -> Result<Self, WorkerError> {
        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Engine(format!("Failed to spawn {program}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Engine("engine stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Engine("engine stdout not captured".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            state: EngineState::Handshaking,
        };

        match tokio::time::timeout(handshake_timeout, engine.handshake()).await {
            Ok(Ok(())) => {
                engine.state = EngineState::Ready;
                Ok(engine)
            }
            Ok(Err(e)) => {
                engine.kill();
                Err(e)
            }
            Err(_) => {
                engine.kill();
                Err(WorkerError::EngineTimeout {
                    phase: "handshake",
                    after_ms: handshake_timeout.as_millis() as u64,
                })
            }
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == EngineState::Closed
    }

    async fn handshake(&mut self) -> Result<(), WorkerError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        Ok(())
    }

    /// Send a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), WorkerError> {
        debug!(cmd, "UCI <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| WorkerError::Engine(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| WorkerError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    /// Next output line, trimmed. End of stream is an error.
    async fn read_line(&mut self) -> Result<String, WorkerError> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| WorkerError::Engine(format!("Failed to read from engine: {e}")))?;
        if read == 0 {
            return Err(WorkerError::Engine("engine closed its output".into()));
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "UCI >");
        Ok(trimmed)
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), WorkerError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    async fn search(&mut self, fen: &str, depth: u32, time_ms: u64) -> Result<SearchReport, WorkerError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth} movetime {time_ms}")).await?;

        let started = Instant::now();
        let mut report = SearchReport::default();
        loop {
            let line = self.read_line().await?;
            if line.starts_with("info") {
                report.apply_info(&line);
            } else if line.starts_with("bestmove") {
                report.best_move = parse_best_move(&line);
                break;
            }
        }
        report.time_ms = started.elapsed().as_millis() as u64;

        Ok(report)
    }

    /// Search one position. The engine is killed if `deadline` passes first.
    pub async fn analyze_position(
        &mut self,
        fen: &str,
        depth: u32,
        time_ms: u64,
        deadline: Duration,
    ) -> Result<SearchReport, WorkerError> {
        match self.state {
            EngineState::Ready => {}
            EngineState::Closed => return Err(WorkerError::EngineClosed),
            state @ (EngineState::Handshaking | EngineState::Analyzing) => {
                return Err(WorkerError::EngineState {
                    actual: state.name(),
                    operation: "start a search",
                })
            }
        }

        self.state = EngineState::Analyzing;
        match tokio::time::timeout(deadline, self.search(fen, depth, time_ms)).await {
            Ok(Ok(report)) => {
                self.state = EngineState::Ready;
                Ok(report)
            }
            Ok(Err(e)) => {
                // Output stream is in an unknown state
                self.kill();
                Err(e)
            }
            Err(_) => {
                self.kill();
                Err(WorkerError::EngineTimeout {
                    phase: "search",
                    after_ms: deadline.as_millis() as u64,
                })
            }
        }
    }

    /// Run a job to completion. Failures come back as a result with `error` set.
    pub async fn analyze(&mut self, job: &Job, grace: Duration) -> AnalysisResult {
        let deadline = Duration::from_millis(job.time_ms) + grace;
        match self
            .analyze_position(&job.fen, job.depth, job.time_ms, deadline)
            .await
        {
            Ok(report) => report.into_result(&job.id),
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Analysis failed");
                AnalysisResult::failed(&job.id, e.to_string())
            }
        }
    }

    /// Send quit and wait for the process to exit. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        let _ = self.send("quit").await;
        if tokio::time::timeout(QUIT_GRACE, self.process.wait())
            .await
            .is_err()
        {
            warn!("Engine ignored quit, killing");
            let _ = self.process.start_kill();
        }
        self.state = EngineState::Closed;
    }

    fn kill(&mut self) {
        let _ = self.process.start_kill();
        self.state = EngineState::Closed;
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        if self.state != EngineState::Closed {
            let _ = self.process.start_kill();
        }
    }
}
