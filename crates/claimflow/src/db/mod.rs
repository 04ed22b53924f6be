//! Database layer for the claim engine.
//!
//! Thin transactional facade over SQLite via sqlx. Each store owns a
//! clone of the pool; connections are acquired per logical operation and
//! released immediately, never held across scheduler ticks.

pub mod audit;
pub mod claims;
pub mod devices;
pub mod models;

pub use audit::AuditLog;
pub use claims::{ClaimStore, NewClaim};
pub use devices::{DeviceRecord, DeviceStore};

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

/// Statements are idempotent so `init` can run on every startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        device_id INTEGER PRIMARY KEY AUTOINCREMENT,
        brand TEXT,
        model TEXT,
        serial_number TEXT NOT NULL UNIQUE,
        category TEXT,
        source_url TEXT,
        retail_price_estimate REAL,
        status TEXT NOT NULL DEFAULT 'INGESTED',
        created_at TEXT NOT NULL
    )
    "#,
    // UNIQUE(device_id) is the authoritative guard against double-filing:
    // two overlapping claim ticks cannot both insert a row.
    r#"
    CREATE TABLE IF NOT EXISTS claims (
        claim_id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id INTEGER NOT NULL UNIQUE REFERENCES devices(device_id),
        status TEXT NOT NULL,
        payout_estimate REAL,
        generated_pdf_filename TEXT,
        failure_description TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS system_log (
        log_id INTEGER PRIMARY KEY AUTOINCREMENT,
        actor TEXT NOT NULL,
        action TEXT NOT NULL,
        details TEXT,
        created_at TEXT NOT NULL
    )
    "#,
];

/// Handle to the shared relational store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (and create if missing) the database at `url`.
    pub async fn open(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url: {url}"))?
            .create_if_missing(true);

        // Each in-memory SQLite connection is its own database, so an
        // in-memory pool must never grow past one connection.
        let max_connections = if url.contains(":memory:") || url.contains("mode=memory") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist yet.
    pub async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("failed to apply schema")?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn devices(&self) -> DeviceStore {
        DeviceStore::new(self.pool.clone())
    }

    pub fn claims(&self) -> ClaimStore {
        ClaimStore::new(self.pool.clone())
    }

    pub fn audit(&self) -> AuditLog {
        AuditLog::new(self.pool.clone())
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    let db = Database::open("sqlite::memory:").await.unwrap();
    db.init().await.unwrap();
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let db = test_db().await;
        db.init().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        assert!(tables.contains(&"devices".to_string()));
        assert!(tables.contains(&"claims".to_string()));
        assert!(tables.contains(&"system_log".to_string()));
    }
}
