//! Ingestion job: drop files in, device rows out.
//!
//! Scans the ingest directory for unmarked `.json` batch files, upserts
//! their records, and renames each file to a `.processed` marker once
//! its transaction has committed. A file that fails anywhere in between
//! stays unmarked and is retried on the next tick, which is safe because
//! the upsert is idempotent on serial number.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::db::{AuditLog, DeviceRecord, DeviceStore};
use crate::health::StatusBoard;

/// Suffix appended to consumed files so they are never reprocessed.
const PROCESSED_SUFFIX: &str = ".processed";

/// Accepted key spellings per logical field, in evaluation order.
/// Batch files come from several generations of the scraping tool, so
/// old spellings stay accepted forever.
const BRAND_KEYS: &[&str] = &["brand", "Brand"];
const MODEL_KEYS: &[&str] = &["model", "Model", "model_number"];
const SERIAL_KEYS: &[&str] = &["serial_number", "Serial Number"];
const CATEGORY_KEYS: &[&str] = &["category", "Category"];
const SOURCE_URL_KEYS: &[&str] = &["scanlily_url", "source_url"];

pub struct IngestJob {
    dir: PathBuf,
    devices: DeviceStore,
    audit: AuditLog,
    board: StatusBoard,
}

impl IngestJob {
    pub fn new(dir: PathBuf, devices: DeviceStore, audit: AuditLog, board: StatusBoard) -> Self {
        Self {
            dir,
            devices,
            audit,
            board,
        }
    }

    /// Process every pending batch file. Returns the number of newly
    /// inserted devices across all files. A single broken file never
    /// blocks the rest of the batch.
    pub async fn run(&self) -> Result<u64> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to read ingest dir {}", self.dir.display()))?;

        let mut total = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".json") {
                continue;
            }

            // The liveness timestamp only advances for a file that made
            // it all the way through.
            match self.process_file(&path, name).await {
                Ok(new_devices) => {
                    total += new_devices;
                    self.board.stamp_ingest().await;
                }
                Err(e) => error!("ingest failed for {name}: {e:#}"),
            }
        }

        Ok(total)
    }

    async fn process_file(&self, path: &Path, name: &str) -> Result<u64> {
        let raw = tokio::fs::read_to_string(path).await.context("read failed")?;
        let data: Value = serde_json::from_str(&raw).context("not valid JSON")?;

        // A drop file is either one record or a list of records.
        let items = match data {
            Value::Array(items) => items,
            single => vec![single],
        };

        let records: Vec<DeviceRecord> = items.iter().filter_map(parse_record).collect();
        let new_devices = self.devices.upsert_batch(&records).await?;

        // Mark consumed only after the transaction committed; a failed
        // rename leaves the file eligible for a harmless re-run.
        let mut processed = path.as_os_str().to_owned();
        processed.push(PROCESSED_SUFFIX);
        tokio::fs::rename(path, &processed)
            .await
            .context("failed to mark file processed")?;

        self.audit
            .append(
                "INGEST_BOT",
                "FILE_PROCESSED",
                json!({"filename": name, "new_devices": new_devices}),
            )
            .await;
        info!("ingested {name}: {new_devices} new devices");

        Ok(new_devices)
    }
}

/// Extract a device record from one raw attribute map. Records without a
/// serial number are dropped: they cannot be deduplicated.
fn parse_record(value: &Value) -> Option<DeviceRecord> {
    let obj = value.as_object()?;
    let serial_number = field(obj, SERIAL_KEYS)?;

    Some(DeviceRecord {
        brand: field(obj, BRAND_KEYS),
        model: field(obj, MODEL_KEYS),
        serial_number,
        category: field(obj, CATEGORY_KEYS),
        source_url: field(obj, SOURCE_URL_KEYS),
    })
}

fn field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_record_canonical_keys() {
        let record = parse_record(&json!({
            "brand": "Acme",
            "model": "X1",
            "serial_number": "S1",
            "category": "tablet",
            "scanlily_url": "https://example.com/s1"
        }))
        .unwrap();

        assert_eq!(record.brand.as_deref(), Some("Acme"));
        assert_eq!(record.model.as_deref(), Some("X1"));
        assert_eq!(record.serial_number, "S1");
        assert_eq!(record.category.as_deref(), Some("tablet"));
        assert_eq!(record.source_url.as_deref(), Some("https://example.com/s1"));
    }

    #[test]
    fn test_parse_record_historical_aliases() {
        let record = parse_record(&json!({
            "Brand": "Acme",
            "model_number": "X1",
            "Serial Number": "S2",
            "Category": "phone",
            "source_url": "https://example.com/s2"
        }))
        .unwrap();

        assert_eq!(record.brand.as_deref(), Some("Acme"));
        assert_eq!(record.model.as_deref(), Some("X1"));
        assert_eq!(record.serial_number, "S2");
        assert_eq!(record.category.as_deref(), Some("phone"));
        assert_eq!(record.source_url.as_deref(), Some("https://example.com/s2"));
    }

    #[test]
    fn test_alias_order_prefers_canonical_key() {
        let record = parse_record(&json!({
            "model": "new-style",
            "model_number": "old-style",
            "serial_number": "S3"
        }))
        .unwrap();

        assert_eq!(record.model.as_deref(), Some("new-style"));
    }

    #[test]
    fn test_record_without_serial_is_dropped() {
        assert!(parse_record(&json!({"brand": "Acme", "model": "X1"})).is_none());
        assert!(parse_record(&json!("not an object")).is_none());
    }
}
