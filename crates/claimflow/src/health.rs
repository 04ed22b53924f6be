//! Liveness state and HTTP probe.
//!
//! Each job's last successful tick is stamped on a shared board; the
//! listener answers read-only snapshots. A timestamp that stops
//! advancing is the operator's signal that a job is stuck.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct BoardState {
    last_ingest_ts: Option<DateTime<Utc>>,
    last_valuation_ts: Option<DateTime<Utc>>,
    last_claim_ts: Option<DateTime<Utc>>,
}

/// Shared job-status board: written by the scheduler, read by the
/// liveness listener.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    dry_run: bool,
    state: Arc<RwLock<BoardState>>,
}

impl StatusBoard {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            state: Arc::new(RwLock::new(BoardState::default())),
        }
    }

    pub async fn stamp_ingest(&self) {
        self.state.write().await.last_ingest_ts = Some(Utc::now());
    }

    pub async fn stamp_valuation(&self) {
        self.state.write().await.last_valuation_ts = Some(Utc::now());
    }

    pub async fn stamp_claim(&self) {
        self.state.write().await.last_claim_ts = Some(Utc::now());
    }

    pub async fn snapshot(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: "ok",
            dry_run: self.dry_run,
            last_ingest_ts: state.last_ingest_ts,
            last_valuation_ts: state.last_valuation_ts,
            last_claim_ts: state.last_claim_ts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub dry_run: bool,
    pub last_ingest_ts: Option<DateTime<Utc>>,
    pub last_valuation_ts: Option<DateTime<Utc>>,
    pub last_claim_ts: Option<DateTime<Utc>>,
}

pub fn router(board: StatusBoard) -> Router {
    // Unmatched paths fall through to axum's default 404.
    Router::new()
        .route("/healthz", get(healthz))
        .with_state(board)
}

/// Serve the liveness endpoint until the process dies.
pub async fn serve(listener: TcpListener, board: StatusBoard) -> Result<()> {
    axum::serve(listener, router(board))
        .await
        .context("health listener failed")
}

async fn healthz(State(board): State<StatusBoard>) -> Json<HealthResponse> {
    Json(board.snapshot().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_shape() {
        let board = StatusBoard::new(true);
        board.stamp_valuation().await;

        let body = serde_json::to_value(board.snapshot().await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["dry_run"], true);
        assert!(body["last_ingest_ts"].is_null());
        assert!(body["last_valuation_ts"].is_string());
        assert!(body["last_claim_ts"].is_null());
    }
}
