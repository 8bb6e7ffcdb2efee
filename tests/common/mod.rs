#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use server::config::DispatcherConfig;
use server::dispatcher::Dispatcher;
use tempfile::NamedTempFile;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Start a dispatcher on an ephemeral port and return its base URL.
pub async fn spawn_server(config: DispatcherConfig) -> String {
    let dispatcher = Arc::new(Dispatcher::new(config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::app(dispatcher)).await.unwrap();
    });
    format!("http://{addr}")
}

/// Dispatcher settings with short waits for tests.
pub fn test_config() -> DispatcherConfig {
    DispatcherConfig {
        acquire_timeout: Duration::from_millis(200),
        max_acquire_timeout: Duration::from_secs(2),
        ..DispatcherConfig::default()
    }
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Line-oriented stand-in for a UCI engine. The first argument picks the
/// behaviour:
/// - `normal`: answers every search with cp 34 at depth 12
/// - `mate`: answers every search with mate in 2
/// - `mute`: never completes the handshake
/// - `hang`: handshakes, then never answers a search
/// - `crash`: handshakes, then exits on the first search
const FAKE_ENGINE: &str = r#"
MODE="$1"
while IFS= read -r line; do
  case "$line" in
    uci)
      [ "$MODE" = mute ] && continue
      echo "id name FakeEngine"
      echo "uciok"
      ;;
    isready)
      echo "readyok"
      ;;
    go*)
      case "$MODE" in
        hang) ;;
        crash) exit 1 ;;
        mate)
          echo "info depth 5 score cp 900 nodes 300 pv d1h5"
          echo "info depth 6 score mate 2 nodes 500 nps 10000 pv h5f7 e8e7 f7e7"
          echo "bestmove h5f7"
          ;;
        *)
          echo "info string NNUE evaluation enabled"
          echo "info depth 1 score cp 10 nodes 20 pv e2e4"
          echo "info depth 12 seldepth 16 score cp 34 nodes 12000 nps 600000 pv e2e4 e7e5 g1f3"
          echo "bestmove e2e4 ponder e7e5"
          ;;
      esac
      ;;
    quit)
      exit 0
      ;;
  esac
done
"#;

/// Write the fake engine script. Run it as `/bin/sh <path> <mode>`; keep the
/// returned file alive for as long as the engine runs.
pub fn fake_engine() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(FAKE_ENGINE.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn engine_args(script: &NamedTempFile, mode: &str) -> Vec<String> {
    vec![
        script.path().to_string_lossy().into_owned(),
        mode.to_string(),
    ]
}
