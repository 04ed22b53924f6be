//! Document-fill boundary.
//!
//! Filing is a strategy injected into the claim job: `DryRunFiler`
//! simulates the whole exchange, `PdfServiceFiler` talks to the external
//! template-fill service. The job itself never branches on a dry-run
//! flag.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::db::models::ClaimStatus;

#[derive(Debug, Error)]
pub enum FilerError {
    /// Live mode without an API key: fatal for the tick, never for the
    /// process.
    #[error("document service API key is not configured")]
    MissingCredentials,
    #[error("document service returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("document service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to persist document: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a (real or simulated) filing.
#[derive(Debug, Clone)]
pub struct FiledClaim {
    pub status: ClaimStatus,
    pub document_filename: Option<String>,
}

#[async_trait]
pub trait ClaimFiler: Send + Sync {
    async fn file(&self, serial_number: &str, payload: &Value) -> Result<FiledClaim, FilerError>;
}

/// Simulated filing: no network, no document.
pub struct DryRunFiler;

#[async_trait]
impl ClaimFiler for DryRunFiler {
    async fn file(&self, serial_number: &str, _payload: &Value) -> Result<FiledClaim, FilerError> {
        info!("dry run: simulated claim for {serial_number}");
        Ok(FiledClaim {
            status: ClaimStatus::DryRunComplete,
            document_filename: None,
        })
    }
}

/// Live filing against the external template-fill service.
pub struct PdfServiceFiler {
    client: reqwest::Client,
    api_url: String,
    template_id: String,
    api_key: Option<String>,
    output_dir: PathBuf,
}

impl PdfServiceFiler {
    pub fn new(
        api_url: &str,
        template_id: &str,
        api_key: Option<String>,
        output_dir: PathBuf,
        timeout: Duration,
    ) -> Result<Self, FilerError> {
        // The fill call blocks on a third party; it gets an explicit
        // timeout rather than the client default.
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            template_id: template_id.to_string(),
            api_key,
            output_dir,
        })
    }
}

#[async_trait]
impl ClaimFiler for PdfServiceFiler {
    async fn file(&self, serial_number: &str, payload: &Value) -> Result<FiledClaim, FilerError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(FilerError::MissingCredentials)?;

        let url = format!("{}/pdf_templates/{}/fill", self.api_url, self.template_id);
        let response = self
            .client
            .post(&url)
            .basic_auth(api_key, Some(""))
            .json(&serde_json::json!({ "data": payload }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FilerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let filename = format!("claim_{serial_number}.pdf");
        tokio::fs::write(self.output_dir.join(&filename), &bytes).await?;
        info!("document saved: {filename}");

        Ok(FiledClaim {
            status: ClaimStatus::PdfGenerated,
            document_filename: Some(filename),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_dry_run_produces_no_document() {
        let filed = DryRunFiler.file("S1", &json!({})).await.unwrap();
        assert_eq!(filed.status, ClaimStatus::DryRunComplete);
        assert!(filed.document_filename.is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_any_request() {
        let filer = PdfServiceFiler::new(
            "https://pdf.invalid/api/v1",
            "tem_test",
            None,
            std::env::temp_dir(),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = filer.file("S1", &json!({})).await.unwrap_err();
        assert!(matches!(err, FilerError::MissingCredentials));

        // An empty key is the same as no key.
        let filer = PdfServiceFiler::new(
            "https://pdf.invalid/api/v1",
            "tem_test",
            Some(String::new()),
            std::env::temp_dir(),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = filer.file("S1", &json!({})).await.unwrap_err();
        assert!(matches!(err, FilerError::MissingCredentials));
    }
}
