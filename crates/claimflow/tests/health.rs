//! Liveness endpoint over a real socket.

use claimflow::health::{serve, StatusBoard};
use tokio::net::TcpListener;

async fn spawn_listener(board: StatusBoard) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = serve(listener, board).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_healthz_reports_snapshot() {
    let board = StatusBoard::new(true);
    board.stamp_ingest().await;
    let base = spawn_listener(board).await;

    let response = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dry_run"], true);
    assert!(body["last_ingest_ts"].is_string());
    assert!(body["last_valuation_ts"].is_null());
    assert!(body["last_claim_ts"].is_null());
}

#[tokio::test]
async fn test_other_paths_are_404() {
    let base = spawn_listener(StatusBoard::new(false)).await;

    let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(response.status(), 404);
}
