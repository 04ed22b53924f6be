//! Device store: upserts and the per-job selection queries.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use super::models::{Device, DeviceStatus};

/// Attributes extracted from one batch-file record. A record without a
/// serial number never becomes a `DeviceRecord` — it cannot be
/// deduplicated and is dropped at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: String,
    pub category: Option<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeviceStore {
    pool: Pool<Sqlite>,
}

impl DeviceStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Upsert a batch of records in one transaction.
    ///
    /// Keyed on serial number; on conflict the existing row is left
    /// untouched, so re-ingesting the same content is a no-op. Returns
    /// the number of newly inserted devices.
    pub async fn upsert_batch(&self, records: &[DeviceRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;
        let mut inserted = 0u64;

        for record in records {
            let rows_affected = sqlx::query(
                r#"
                INSERT INTO devices (brand, model, serial_number, category, source_url, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(serial_number) DO NOTHING
                "#,
            )
            .bind(&record.brand)
            .bind(&record.model)
            .bind(&record.serial_number)
            .bind(&record.category)
            .bind(&record.source_url)
            .bind(DeviceStatus::Ingested.as_str())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            inserted += rows_affected;
        }

        tx.commit().await.context("failed to commit upsert batch")?;
        Ok(inserted)
    }

    /// The next device awaiting valuation: null price, still `INGESTED`.
    /// Ordered by device_id so the pick is stable across ticks.
    pub async fn next_unvalued(&self) -> Result<Option<Device>> {
        let device = sqlx::query_as(
            r#"
            SELECT * FROM devices
            WHERE retail_price_estimate IS NULL AND status = 'INGESTED'
            ORDER BY device_id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    /// Record a resolved market price. Price and status move together in
    /// one statement, preserving the "non-null price implies status is
    /// not INGESTED" invariant.
    pub async fn set_valuated(&self, device_id: i64, price: f64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE devices
            SET retail_price_estimate = ?, status = 'VALUATED'
            WHERE device_id = ?
            "#,
        )
        .bind(price)
        .bind(device_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Terminal escalation: an operator has to look at this device.
    pub async fn mark_manual_review(&self, device_id: i64) -> Result<()> {
        sqlx::query("UPDATE devices SET status = 'MANUAL_REVIEW' WHERE device_id = ?")
            .bind(device_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// The next valuated device without a claim row. The exclusion is
    /// part of the query; the UNIQUE constraint on claims.device_id is
    /// the authoritative guard if two schedulers race past it.
    pub async fn next_claimable(&self) -> Result<Option<Device>> {
        let device = sqlx::query_as(
            r#"
            SELECT * FROM devices
            WHERE status = 'VALUATED'
              AND device_id NOT IN (SELECT device_id FROM claims)
            ORDER BY device_id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    pub async fn by_serial(&self, serial_number: &str) -> Result<Option<Device>> {
        let device = sqlx::query_as("SELECT * FROM devices WHERE serial_number = ?")
            .bind(serial_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(device)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
