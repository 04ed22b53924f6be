//! Claimflow daemon.
//!
//! Usage:
//!     claimflow --database sqlite://claimflow.db --ingest-dir data/ingest --dry-run

use std::path::PathBuf;
use std::time::Duration;

use claimflow::{Engine, EngineConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "claimflow", about = "Scheduled claim-filing engine for physical devices")]
struct Args {
    /// Database connection string
    #[arg(long, env = "CLAIMFLOW_DATABASE", default_value = "sqlite://claimflow.db")]
    database: String,

    /// Directory scanned for JSON batch drop files
    #[arg(long, env = "INGEST_DIR", default_value = "data/ingest")]
    ingest_dir: PathBuf,

    /// Directory for generated claim documents
    #[arg(long, env = "PDF_OUTPUT_DIR", default_value = "data/pdfs")]
    output_dir: PathBuf,

    /// Account-holder signature artifact
    #[arg(long, env = "SIGNATURE_FILE", default_value = "signatures/account_holder.txt")]
    signature_file: PathBuf,

    /// Price search endpoint, queried as GET {endpoint}?q={text}
    #[arg(long, env = "LOOKUP_ENDPOINT", default_value = "https://lite.duckduckgo.com/lite/")]
    lookup_endpoint: String,

    /// Document-fill service base URL
    #[arg(long, env = "PDF_API_URL", default_value = "https://www.pdfotter.com/api/v1")]
    pdf_api_url: String,

    /// Template to fill for claim documents
    #[arg(long, env = "PDF_TEMPLATE_ID", default_value = "tem_device_claim")]
    pdf_template_id: String,

    /// Document-fill API key (basic auth); required for live filing
    #[arg(long, env = "PDF_API_KEY")]
    pdf_api_key: Option<String>,

    /// Timeout for the document-fill call, in seconds
    #[arg(long, default_value_t = 60)]
    pdf_timeout_secs: u64,

    /// Simulate claim filing instead of calling the document service
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Liveness endpoint port
    #[arg(long, env = "HEALTH_PORT", default_value_t = 8000)]
    health_port: u16,

    /// Seconds between ingestion scans (minimum 1)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    ingest_interval_secs: u64,

    /// Seconds between valuation attempts (minimum 1)
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    valuation_interval_secs: u64,

    /// Seconds between claim attempts (minimum 1)
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    claim_interval_secs: u64,

    /// Lower bound of the pre-lookup jitter, in seconds
    #[arg(long, default_value_t = 3)]
    jitter_min_secs: u64,

    /// Upper bound of the pre-lookup jitter, in seconds
    #[arg(long, default_value_t = 6)]
    jitter_max_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claimflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Starting claimflow engine");
    tracing::info!("  Database: {}", args.database);
    tracing::info!("  Ingest dir: {}", args.ingest_dir.display());
    tracing::info!("  Dry run: {}", args.dry_run);

    let config = EngineConfig {
        database_url: args.database,
        ingest_dir: args.ingest_dir,
        output_dir: args.output_dir,
        signature_file: args.signature_file,
        lookup_endpoint: args.lookup_endpoint,
        pdf_api_url: args.pdf_api_url,
        pdf_template_id: args.pdf_template_id,
        pdf_api_key: args.pdf_api_key,
        pdf_timeout: Duration::from_secs(args.pdf_timeout_secs),
        dry_run: args.dry_run,
        health_port: args.health_port,
        ingest_interval: Duration::from_secs(args.ingest_interval_secs),
        valuation_interval: Duration::from_secs(args.valuation_interval_secs),
        claim_interval: Duration::from_secs(args.claim_interval_secs),
        jitter_min: Duration::from_secs(args.jitter_min_secs),
        jitter_max: Duration::from_secs(args.jitter_max_secs),
    };

    let engine = Engine::connect(config).await?;
    engine.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_parse() {
        let args = Args::try_parse_from(["claimflow"]).unwrap();
        assert_eq!(args.ingest_interval_secs, 10);
        assert_eq!(args.valuation_interval_secs, 30);
        assert_eq!(args.claim_interval_secs, 60);
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        for flag in [
            "--ingest-interval-secs",
            "--valuation-interval-secs",
            "--claim-interval-secs",
        ] {
            assert!(Args::try_parse_from(["claimflow", flag, "0"]).is_err());
        }
    }
}
