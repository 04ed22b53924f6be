//! Domain models for the claim workflow.
//!
//! Statuses are stored as TEXT and parsed at the row boundary with error
//! propagation, so a corrupted row surfaces as a decode error instead of
//! a silent default.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Device lifecycle status.
///
/// `INGESTED → VALUATED` is the happy path; `MANUAL_REVIEW` is terminal
/// for the engine (an operator takes over). "Claimed" is implicit: a row
/// in `claims` exists for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    /// Inserted from a batch file, no price yet
    #[default]
    Ingested,
    /// Market price resolved
    Valuated,
    /// Needs a human: missing attributes or no parsable price
    ManualReview,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Ingested => "INGESTED",
            DeviceStatus::Valuated => "VALUATED",
            DeviceStatus::ManualReview => "MANUAL_REVIEW",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INGESTED" => Ok(DeviceStatus::Ingested),
            "VALUATED" => Ok(DeviceStatus::Valuated),
            "MANUAL_REVIEW" => Ok(DeviceStatus::ManualReview),
            _ => Err(format!("Invalid device status: '{}'", s)),
        }
    }
}

/// Claim outcome status. Claims are immutable once inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Simulated filing, no document produced
    DryRunComplete,
    /// Document generated and persisted to the output directory
    PdfGenerated,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::DryRunComplete => "DRY_RUN_COMPLETE",
            ClaimStatus::PdfGenerated => "PDF_GENERATED",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DRY_RUN_COMPLETE" => Ok(ClaimStatus::DryRunComplete),
            "PDF_GENERATED" => Ok(ClaimStatus::PdfGenerated),
            _ => Err(format!("Invalid claim status: '{}'", s)),
        }
    }
}

/// A physical device moving through the workflow. Never deleted.
#[derive(Debug, Clone)]
pub struct Device {
    pub device_id: i64,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: String,
    pub category: Option<String>,
    pub source_url: Option<String>,
    pub retail_price_estimate: Option<f64>,
    pub status: DeviceStatus,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Device {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let status_raw: String = row.try_get("status")?;
        let status = status_raw
            .parse::<DeviceStatus>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Self {
            device_id: row.try_get("device_id")?,
            brand: row.try_get("brand")?,
            model: row.try_get("model")?,
            serial_number: row.try_get("serial_number")?,
            category: row.try_get("category")?,
            source_url: row.try_get("source_url")?,
            retail_price_estimate: row.try_get("retail_price_estimate")?,
            status,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A filed (or simulated) claim. At most one per device.
#[derive(Debug, Clone)]
pub struct Claim {
    pub claim_id: i64,
    pub device_id: i64,
    pub status: ClaimStatus,
    pub payout_estimate: Option<f64>,
    pub generated_pdf_filename: Option<String>,
    pub failure_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Claim {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let status_raw: String = row.try_get("status")?;
        let status = status_raw
            .parse::<ClaimStatus>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Self {
            claim_id: row.try_get("claim_id")?,
            device_id: row.try_get("device_id")?,
            status,
            payout_estimate: row.try_get("payout_estimate")?,
            generated_pdf_filename: row.try_get("generated_pdf_filename")?,
            failure_description: row.try_get("failure_description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_status_serialization() {
        assert_eq!(
            serde_json::to_string(&DeviceStatus::Ingested).unwrap(),
            format!("\"{}\"", DeviceStatus::Ingested.as_str())
        );
        assert_eq!(
            serde_json::to_string(&DeviceStatus::ManualReview).unwrap(),
            format!("\"{}\"", DeviceStatus::ManualReview.as_str())
        );
    }

    #[test]
    fn test_device_status_from_str() {
        assert_eq!(
            DeviceStatus::Ingested
                .as_str()
                .parse::<DeviceStatus>()
                .unwrap(),
            DeviceStatus::Ingested
        );
        assert_eq!(
            "manual_review".parse::<DeviceStatus>().unwrap(),
            DeviceStatus::ManualReview
        );
        assert!("CLAIMED".parse::<DeviceStatus>().is_err());
    }

    #[test]
    fn test_claim_status_round_trip() {
        for status in [ClaimStatus::DryRunComplete, ClaimStatus::PdfGenerated] {
            assert_eq!(status.as_str().parse::<ClaimStatus>().unwrap(), status);
        }
    }
}
