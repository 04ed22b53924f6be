//! Claim store.
//!
//! The UNIQUE constraint on `claims.device_id` makes at-most-one-claim-
//! per-device a structural invariant; `insert` reports a lost race as
//! `false` instead of an error.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use super::models::{Claim, ClaimStatus};

#[derive(Debug, Clone)]
pub struct NewClaim {
    pub device_id: i64,
    pub status: ClaimStatus,
    pub payout_estimate: Option<f64>,
    pub generated_pdf_filename: Option<String>,
    pub failure_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClaimStore {
    pool: Pool<Sqlite>,
}

impl ClaimStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert a claim row. Returns `false` when the device already has
    /// one (a concurrent tick won the race); any other failure is an
    /// error.
    pub async fn insert(&self, claim: &NewClaim) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO claims
                (device_id, status, payout_estimate, generated_pdf_filename, failure_description, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(claim.device_id)
        .bind(claim.status.as_str())
        .bind(claim.payout_estimate)
        .bind(&claim.generated_pdf_filename)
        .bind(&claim.failure_description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(e).context("failed to insert claim"),
        }
    }

    pub async fn for_device(&self, device_id: i64) -> Result<Option<Claim>> {
        let claim = sqlx::query_as("SELECT * FROM claims WHERE device_id = ?")
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(claim)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM claims")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::db::DeviceRecord;

    fn dry_run_claim(device_id: i64) -> NewClaim {
        NewClaim {
            device_id,
            status: ClaimStatus::DryRunComplete,
            payout_estimate: Some(450.0),
            generated_pdf_filename: None,
            failure_description: Some("Dry run test".to_string()),
        }
    }

    #[tokio::test]
    async fn test_at_most_one_claim_per_device() {
        let db = test_db().await;
        let devices = db.devices();
        let claims = db.claims();

        devices
            .upsert_batch(&[DeviceRecord {
                brand: Some("Acme".to_string()),
                model: Some("X1".to_string()),
                serial_number: "S1".to_string(),
                category: None,
                source_url: None,
            }])
            .await
            .unwrap();
        let device = devices.by_serial("S1").await.unwrap().unwrap();

        assert!(claims.insert(&dry_run_claim(device.device_id)).await.unwrap());
        // Second filing loses the race and is reported, not raised.
        assert!(!claims.insert(&dry_run_claim(device.device_id)).await.unwrap());
        assert_eq!(claims.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claimed_device_is_excluded_from_selection() {
        let db = test_db().await;
        let devices = db.devices();
        let claims = db.claims();

        devices
            .upsert_batch(&[DeviceRecord {
                brand: Some("Acme".to_string()),
                model: Some("X1".to_string()),
                serial_number: "S1".to_string(),
                category: None,
                source_url: None,
            }])
            .await
            .unwrap();
        let device = devices.by_serial("S1").await.unwrap().unwrap();
        devices.set_valuated(device.device_id, 450.0).await.unwrap();

        assert!(devices.next_claimable().await.unwrap().is_some());
        claims.insert(&dry_run_claim(device.device_id)).await.unwrap();
        assert!(devices.next_claimable().await.unwrap().is_none());

        let claim = claims.for_device(device.device_id).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::DryRunComplete);
        assert_eq!(claim.payout_estimate, Some(450.0));
    }
}
