//! Claim job: turn one valuated device into a claim row.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db::models::{ClaimStatus, Device};
use crate::db::{AuditLog, ClaimStore, DeviceStore, NewClaim};
use crate::health::StatusBoard;
use crate::pdf::ClaimFiler;

/// Fixed failure narrative used on every filed claim form.
const FAILURE_DESCRIPTION: &str =
    "Device stopped functioning during normal usage. Screen does not power on.";

/// Placeholder when the signature artifact is absent.
const SIGNATURE_FALLBACK: &str = "Signature on File";

pub struct ClaimJob {
    devices: DeviceStore,
    claims: ClaimStore,
    audit: AuditLog,
    board: StatusBoard,
    filer: Arc<dyn ClaimFiler>,
    signature_file: PathBuf,
}

impl ClaimJob {
    pub fn new(
        devices: DeviceStore,
        claims: ClaimStore,
        audit: AuditLog,
        board: StatusBoard,
        filer: Arc<dyn ClaimFiler>,
        signature_file: PathBuf,
    ) -> Self {
        Self {
            devices,
            claims,
            audit,
            board,
            filer,
            signature_file,
        }
    }

    /// File a claim for at most one device per tick.
    pub async fn run(&self) -> Result<()> {
        let Some(device) = self.devices.next_claimable().await? else {
            return Ok(());
        };

        info!(
            "filing claim for {} ({} {})",
            device.serial_number,
            device.brand.as_deref().unwrap_or("?"),
            device.model.as_deref().unwrap_or("?"),
        );

        let payload = self.build_payload(&device).await;
        let filed = match self.filer.file(&device.serial_number, &payload).await {
            Ok(filed) => filed,
            Err(e) => {
                // Transient: the device stays VALUATED and is retried on
                // the next eligible tick.
                warn!("claim filing failed for {}: {e}", device.serial_number);
                return Ok(());
            }
        };

        let failure_description = match filed.status {
            ClaimStatus::DryRunComplete => Some("Dry run test".to_string()),
            ClaimStatus::PdfGenerated => None,
        };
        let inserted = self
            .claims
            .insert(&NewClaim {
                device_id: device.device_id,
                status: filed.status,
                payout_estimate: device.retail_price_estimate,
                generated_pdf_filename: filed.document_filename.clone(),
                failure_description,
            })
            .await?;

        if !inserted {
            warn!(
                "device {} was claimed by a concurrent tick, skipping",
                device.serial_number
            );
            return Ok(());
        }

        self.audit
            .append(
                "CLAIM_BOT",
                filed.status.as_str(),
                json!({
                    "device_id": device.device_id,
                    "serial_number": device.serial_number,
                    "filename": filed.document_filename,
                }),
            )
            .await;
        // Only a recorded claim advances the liveness timestamp.
        self.board.stamp_claim().await;
        info!(
            "claim recorded for {}: {}",
            device.serial_number, filed.status
        );

        Ok(())
    }

    /// Field map for the claim form template.
    async fn build_payload(&self, device: &Device) -> Value {
        let today = Utc::now().format("%m/%d/%Y").to_string();

        json!({
            "Brand": device.brand,
            "Model number": device.model,
            "Serial number": device.serial_number,
            "Purchase price": device.retail_price_estimate,
            "Date of failure MM/DD/YYYY": today,
            "Describe what happened": FAILURE_DESCRIPTION,
            "Claim ID": device.device_id.to_string(),
            "Signature of enrolled account holder": self.signature().await,
            "Date MM/DD/YYYY": today,
        })
    }

    async fn signature(&self) -> String {
        match tokio::fs::read_to_string(&self.signature_file).await {
            Ok(contents) => contents.trim().to_string(),
            Err(_) => {
                info!(
                    "signature file {} not readable, using text fallback",
                    self.signature_file.display()
                );
                SIGNATURE_FALLBACK.to_string()
            }
        }
    }
}
