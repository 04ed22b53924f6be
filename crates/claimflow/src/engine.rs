//! Scheduler: three jobs on independent fixed intervals, forever.
//!
//! A single `select!` loop dispatches at most one job body at a time, so
//! same-kind jobs never overlap and cross-kind dispatch is serialized by
//! construction. A job failure is caught at the dispatch boundary and
//! logged; nothing a job does can stop the schedule.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::claim::ClaimJob;
use crate::db::Database;
use crate::health::{self, StatusBoard};
use crate::ingest::IngestJob;
use crate::lookup::{HttpSearchLookup, PriceLookup};
use crate::pdf::{ClaimFiler, DryRunFiler, PdfServiceFiler};
use crate::valuation::ValuationJob;

/// The lookup call is cheap; it shares a fixed client timeout rather
/// than a configuration knob.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub ingest_dir: PathBuf,
    pub output_dir: PathBuf,
    pub signature_file: PathBuf,
    pub lookup_endpoint: String,
    pub pdf_api_url: String,
    pub pdf_template_id: String,
    pub pdf_api_key: Option<String>,
    pub pdf_timeout: Duration,
    pub dry_run: bool,
    pub health_port: u16,
    pub ingest_interval: Duration,
    pub valuation_interval: Duration,
    pub claim_interval: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

pub struct Engine {
    config: EngineConfig,
    board: StatusBoard,
    ingest: IngestJob,
    valuation: ValuationJob,
    claim: ClaimJob,
}

impl Engine {
    /// Connect to the store, bootstrap the schema, and wire the jobs.
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        let db = Database::open(&config.database_url).await?;
        db.init().await?;

        let board = StatusBoard::new(config.dry_run);

        let lookup: Arc<dyn PriceLookup> =
            Arc::new(HttpSearchLookup::new(&config.lookup_endpoint, LOOKUP_TIMEOUT)?);
        let filer: Arc<dyn ClaimFiler> = if config.dry_run {
            Arc::new(DryRunFiler)
        } else {
            Arc::new(PdfServiceFiler::new(
                &config.pdf_api_url,
                &config.pdf_template_id,
                config.pdf_api_key.clone(),
                config.output_dir.clone(),
                config.pdf_timeout,
            )?)
        };

        let ingest = IngestJob::new(
            config.ingest_dir.clone(),
            db.devices(),
            db.audit(),
            board.clone(),
        );
        let valuation = ValuationJob::new(
            db.devices(),
            db.audit(),
            board.clone(),
            lookup,
            config.jitter_min,
            config.jitter_max,
        );
        let claim = ClaimJob::new(
            db.devices(),
            db.claims(),
            db.audit(),
            board.clone(),
            filer,
            config.signature_file.clone(),
        );

        Ok(Self {
            config,
            board,
            ingest,
            valuation,
            claim,
        })
    }

    /// Run the scheduler and liveness listener until the process is
    /// terminated.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.health_port))
            .await
            .with_context(|| format!("failed to bind health port {}", self.config.health_port))?;
        info!("health endpoint on {}", listener.local_addr()?);

        let board = self.board.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(listener, board).await {
                error!("health listener exited: {e:#}");
            }
        });

        // `interval` panics on a zero period; a config handed in below
        // the CLI floor still gets a one-second schedule.
        let floor = Duration::from_secs(1);
        let mut ingest_timer = interval(self.config.ingest_interval.max(floor));
        let mut valuation_timer = interval(self.config.valuation_interval.max(floor));
        let mut claim_timer = interval(self.config.claim_interval.max(floor));
        for timer in [&mut ingest_timer, &mut valuation_timer, &mut claim_timer] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        info!("scheduler running (dry_run={})", self.config.dry_run);
        loop {
            tokio::select! {
                _ = ingest_timer.tick() => {
                    if let Err(e) = self.ingest.run().await {
                        error!("ingest tick failed: {e:#}");
                    }
                }
                _ = valuation_timer.tick() => {
                    if let Err(e) = self.valuation.run().await {
                        error!("valuation tick failed: {e:#}");
                    }
                }
                _ = claim_timer.tick() => {
                    if let Err(e) = self.claim.run().await {
                        error!("claim tick failed: {e:#}");
                    }
                }
            }
        }
    }
}
