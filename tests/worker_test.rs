/// Engine bridge and worker loop tests.
///
/// A shell script speaks just enough UCI to stand in for a real engine (see
/// `common::fake_engine`), so these run without Stockfish installed.

mod common;

use std::time::Duration;

use analysis_worker::backoff::BackoffPolicy;
use analysis_worker::{DispatcherClient, EngineState, UciEngine, Worker, WorkerConfig, WorkerError};
use chess_core::Job;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use common::{client, engine_args, fake_engine, spawn_server, test_config, START_FEN};

const HANDSHAKE: Duration = Duration::from_secs(5);

fn job(id: &str, time_ms: u64) -> Job {
    Job {
        id: id.to_string(),
        fen: START_FEN.to_string(),
        depth: 12,
        time_ms,
        priority: 0,
    }
}

#[tokio::test]
async fn test_engine_handshake_and_search() {
    let script = fake_engine();
    let mut engine = UciEngine::spawn("/bin/sh", &engine_args(&script, "normal"), HANDSHAKE)
        .await
        .unwrap();
    assert_eq!(engine.state(), EngineState::Ready);

    let report = engine
        .analyze_position(START_FEN, 12, 100, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(report.best_move, "e2e4");
    assert_eq!(report.cp, Some(34));
    assert_eq!(report.depth, 12);
    assert_eq!(report.nodes, 12000);
    assert_eq!(report.nps, 600000);
    assert_eq!(report.pv, "e2e4 e7e5 g1f3");
    assert_eq!(engine.state(), EngineState::Ready);

    // The same engine serves consecutive searches
    let result = engine.analyze(&job("j1", 100), Duration::from_secs(5)).await;
    assert_eq!(result.job_id, "j1");
    assert_eq!(result.eval, 34);
    assert!(result.error.is_none());

    engine.close().await;
    assert!(engine.is_closed());
    engine.close().await;
}

#[tokio::test]
async fn test_engine_reports_mate() {
    let script = fake_engine();
    let mut engine = UciEngine::spawn("/bin/sh", &engine_args(&script, "mate"), HANDSHAKE)
        .await
        .unwrap();

    let result = engine.analyze(&job("m", 100), Duration::from_secs(5)).await;
    assert_eq!(result.mate, Some(2));
    assert_eq!(result.eval, 9980);
    assert_eq!(result.best_move, "h5f7");
    engine.close().await;
}

#[tokio::test]
async fn test_engine_handshake_timeout() {
    let script = fake_engine();
    let err = UciEngine::spawn(
        "/bin/sh",
        &engine_args(&script, "mute"),
        Duration::from_millis(200),
    )
    .await
    .err()
    .expect("handshake should time out");
    assert!(matches!(
        err,
        WorkerError::EngineTimeout {
            phase: "handshake",
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_engine_binary() {
    let err = UciEngine::spawn("/nonexistent/engine", &[], HANDSHAKE)
        .await
        .err()
        .expect("spawn should fail");
    assert!(matches!(err, WorkerError::Engine(_)));
}

#[tokio::test]
async fn test_hung_search_becomes_error_result() {
    let script = fake_engine();
    let mut engine = UciEngine::spawn("/bin/sh", &engine_args(&script, "hang"), HANDSHAKE)
        .await
        .unwrap();

    let result = engine.analyze(&job("slow", 50), Duration::from_millis(200)).await;
    assert_eq!(result.job_id, "slow");
    assert!(result.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(engine.state(), EngineState::Closed);

    // A closed engine refuses further work
    let err = engine
        .analyze_position(START_FEN, 1, 10, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::EngineClosed));
}

#[tokio::test]
async fn test_crashed_engine_becomes_error_result() {
    let script = fake_engine();
    let mut engine = UciEngine::spawn("/bin/sh", &engine_args(&script, "crash"), HANDSHAKE)
        .await
        .unwrap();

    let result = engine.analyze(&job("boom", 50), Duration::from_secs(5)).await;
    assert!(result.is_error());
    assert!(engine.is_closed());
}

fn worker_config(base: &str, args: Vec<String>) -> WorkerConfig {
    WorkerConfig {
        dispatcher_url: base.to_string(),
        engine_path: "/bin/sh".to_string(),
        engine_args: args,
        handshake_timeout: HANDSHAKE,
        search_grace: Duration::from_secs(5),
        idle_delay: Duration::from_millis(20),
        acquire_wait: Duration::from_millis(100),
        http_timeout: Duration::from_secs(5),
        backoff: BackoffPolicy {
            base: Duration::from_millis(10),
            max: Duration::from_millis(50),
            max_attempts: 3,
        },
        ..WorkerConfig::default()
    }
}

async fn wait_for_batch(base: &str, batch_id: &str) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    loop {
        let batch: Value = client()
            .get(format!("{base}/api/batch?id={batch_id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if batch["completed"] == batch["total"] {
            return batch;
        }
        assert!(tokio::time::Instant::now() < deadline, "batch never completed");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_worker_completes_game_batch() {
    let base = spawn_server(test_config()).await;
    let script = fake_engine();

    let resp = client()
        .post(format!("{base}/api/games/analyze"))
        .json(&json!({ "pgn": "1. e4 e5 2. Nf3 Nc6", "time_ms": 50 }))
        .send()
        .await
        .unwrap();
    let ticket: Value = resp.json().await.unwrap();
    let batch_id = ticket["batch_id"].as_str().unwrap().to_string();

    let config = worker_config(&base, engine_args(&script, "normal"));
    let http = DispatcherClient::new(&base, config.http_timeout).unwrap();
    let worker = Worker::new(0, http, config);
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    let batch = wait_for_batch(&base, &batch_id).await;
    assert_eq!(batch["total"], 4);
    for result in batch["results"].as_object().unwrap().values() {
        assert_eq!(result["eval"], 34);
        assert_eq!(result["best_move"], "e2e4");
    }

    cancel.cancel();
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.analyzed, 4);
    assert_eq!(summary.failed, 0);

    // Every side-to-move eval is +34, so each move hands the opponent 68cp
    let report: Value = client()
        .get(format!("{base}/api/batch/accuracy?batch_id={batch_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["white_moves"], 2);
    assert_eq!(report["black_moves"], 1);
    assert_eq!(report["white_avg_cpl"], 68.0);
    let accuracy = report["white_accuracy"].as_f64().unwrap();
    assert!((accuracy - 100.0 * (-68.0f64 / 80.0).exp()).abs() < 1e-9);
}

#[tokio::test]
async fn test_worker_reports_failed_analysis() {
    let base = spawn_server(test_config()).await;
    let script = fake_engine();

    let resp = client()
        .post(format!("{base}/api/jobs"))
        .json(&json!({ "id": "crashy", "fen": START_FEN, "time_ms": 50 }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let config = worker_config(&base, engine_args(&script, "crash"));
    let http = DispatcherClient::new(&base, config.http_timeout).unwrap();
    let worker = Worker::new(1, http, config);
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    let result: Value = loop {
        let resp = client()
            .get(format!("{base}/api/results?id=crashy"))
            .send()
            .await
            .unwrap();
        if resp.status().is_success() {
            break resp.json().await.unwrap();
        }
        assert!(tokio::time::Instant::now() < deadline, "no result submitted");
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert!(result["error"].is_string());

    cancel.cancel();
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_worker_gives_up_on_unreachable_dispatcher() {
    let script = fake_engine();
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = worker_config(&base, engine_args(&script, "normal"));
    let http = DispatcherClient::new(&base, config.http_timeout).unwrap();
    let worker = Worker::new(2, http, config);

    let err = worker.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, WorkerError::RetriesExhausted { attempts: 3, .. }));
}
