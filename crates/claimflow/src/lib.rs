//! Claimflow: a scheduled claim-filing engine for physical devices.
//!
//! Devices arrive as JSON batch files, get a market value from an
//! external lookup, and end as a generated claim document. Three
//! periodic jobs drive the `INGESTED → VALUATED → claimed` state machine
//! against a shared SQLite store, with a liveness endpoint for
//! operators.

pub mod claim;
pub mod db;
pub mod engine;
pub mod health;
pub mod ingest;
pub mod lookup;
pub mod pdf;
pub mod valuation;

pub use engine::{Engine, EngineConfig};
