//! Valuation job: resolve a market price for one ingested device.
//!
//! Processes at most one device per tick as a throttle against the
//! lookup service's rate limits, and sleeps a bounded random jitter
//! before the external call as a politeness measure.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use crate::db::{AuditLog, DeviceStore};
use crate::health::StatusBoard;
use crate::lookup::PriceLookup;

/// Monetary pattern: `$` followed by digits with optional thousands
/// separators and exactly two decimal places. The first match in a
/// snippet is authoritative.
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\d[\d,]*(?:\.\d{2})?").expect("price regex is valid"));

pub struct ValuationJob {
    devices: DeviceStore,
    audit: AuditLog,
    board: StatusBoard,
    lookup: Arc<dyn PriceLookup>,
    jitter_min: Duration,
    jitter_max: Duration,
}

impl ValuationJob {
    pub fn new(
        devices: DeviceStore,
        audit: AuditLog,
        board: StatusBoard,
        lookup: Arc<dyn PriceLookup>,
        jitter_min: Duration,
        jitter_max: Duration,
    ) -> Self {
        Self {
            devices,
            audit,
            board,
            lookup,
            jitter_min,
            jitter_max,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let Some(device) = self.devices.next_unvalued().await? else {
            return Ok(());
        };

        // No brand or model means no usable query: escalate without
        // touching the lookup service.
        let (Some(brand), Some(model)) = (device.brand.as_deref(), device.model.as_deref())
        else {
            self.devices.mark_manual_review(device.device_id).await?;
            info!(
                "device {} has no brand/model, marked MANUAL_REVIEW",
                device.serial_number
            );
            return Ok(());
        };

        let query = format!("{brand} {model} price");
        info!("valuating {}: \"{query}\"", device.serial_number);

        let jitter = self.jitter();
        if !jitter.is_zero() {
            tokio::time::sleep(jitter).await;
        }

        let snippet = match self.lookup.search(&query).await {
            Ok(snippet) => snippet,
            Err(e) => {
                // Transient: the device stays INGESTED and is re-selected
                // on the next eligible tick.
                warn!("lookup failed for {}: {e:#}", device.serial_number);
                return Ok(());
            }
        };

        match snippet.as_deref().and_then(extract_price) {
            Some(price) => {
                self.devices.set_valuated(device.device_id, price).await?;
                self.audit
                    .append(
                        "VALUATION_BOT",
                        "PRICE_FOUND",
                        json!({"device_id": device.device_id, "price": price}),
                    )
                    .await;
                // Only a resolved price advances the liveness timestamp.
                self.board.stamp_valuation().await;
                info!("valuated {} at ${price:.2}", device.serial_number);
            }
            None => {
                self.devices.mark_manual_review(device.device_id).await?;
                info!(
                    "no parsable price for {}, marked MANUAL_REVIEW",
                    device.serial_number
                );
            }
        }

        Ok(())
    }

    fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        let min_ms = self.jitter_min.as_millis() as u64;
        let max_ms = self.jitter_max.as_millis() as u64;
        let ms = rand::thread_rng().gen_range(min_ms..=max_ms);
        Duration::from_millis(ms)
    }
}

/// Pull the first monetary amount out of a free-text snippet.
/// `$1,234.50` yields 1234.50; `$999` yields 999.0.
pub fn extract_price(text: &str) -> Option<f64> {
    let matched = PRICE_RE.find(text)?;
    let cleaned = matched.as_str().trim_start_matches('$').replace(',', "");
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_price_with_separators_and_cents() {
        assert_eq!(
            extract_price("refurbished from $1,234.50 at retail"),
            Some(1234.50)
        );
    }

    #[test]
    fn test_extract_price_whole_dollars() {
        assert_eq!(extract_price("best price $999 today"), Some(999.0));
    }

    #[test]
    fn test_extract_price_first_match_wins() {
        assert_eq!(
            extract_price("was $450.00, now $399.99"),
            Some(450.0)
        );
    }

    #[test]
    fn test_extract_price_no_match() {
        assert_eq!(extract_price("sold out everywhere"), None);
        assert_eq!(extract_price("price in euros: 450,00"), None);
    }

    #[test]
    fn test_extract_price_ignores_trailing_digits_without_cents() {
        // A single decimal digit is not a cents amount; the integer part
        // still matches.
        assert_eq!(extract_price("about $450.5 used"), Some(450.0));
    }
}
