//! Best-effort audit trail.
//!
//! Every job appends structured records to `system_log` for forensic
//! traceability. A failed append is reported at WARN and swallowed; the
//! audit side channel is never allowed to fail a job.

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AuditLog {
    pool: Pool<Sqlite>,
}

impl AuditLog {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn append(&self, actor: &str, action: &str, details: serde_json::Value) {
        let result = sqlx::query(
            "INSERT INTO system_log (actor, action, details, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(actor)
        .bind(action)
        .bind(details.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("audit append failed for {actor}/{action}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_records_entry() {
        let db = test_db().await;
        let audit = db.audit();

        audit
            .append(
                "INGEST_BOT",
                "FILE_PROCESSED",
                json!({"filename": "drop.json", "new_devices": 3}),
            )
            .await;

        let (actor, action, details): (String, String, String) =
            sqlx::query_as("SELECT actor, action, details FROM system_log")
                .fetch_one(db.pool())
                .await
                .unwrap();

        assert_eq!(actor, "INGEST_BOT");
        assert_eq!(action, "FILE_PROCESSED");
        let details: serde_json::Value = serde_json::from_str(&details).unwrap();
        assert_eq!(details["new_devices"], 3);
    }
}
