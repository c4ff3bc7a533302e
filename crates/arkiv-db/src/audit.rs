//! Audit log sink.
//!
//! Entries are written inside the same transaction as the mutation
//! they describe, so an aborted commit never leaves an orphaned audit
//! row.

use sqlx::{Postgres, Transaction};
use tracing::trace;

use arkiv_core::{new_v7, AuditEntry, Result};

/// PostgreSQL audit log sink.
pub struct PgAuditLog;

impl PgAuditLog {
    /// Write one audit row inside the caller's transaction.
    pub async fn log_tx(tx: &mut Transaction<'_, Postgres>, entry: &AuditEntry) -> Result<()> {
        let changed = serde_json::to_value(&entry.changed_fields)?;
        sqlx::query(
            r#"INSERT INTO audit_log (id, document_id, actor_id, action, changed_fields)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(new_v7())
        .bind(entry.document_id)
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(changed)
        .execute(&mut **tx)
        .await?;

        trace!(
            document_id = %entry.document_id,
            action = entry.action.as_str(),
            changed = entry.changed_fields.len(),
            "audit: entry written"
        );
        Ok(())
    }
}
