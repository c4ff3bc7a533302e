//! Attachment repository implementation.

use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use arkiv_core::{new_v7, Attachment, Error, Result, SORT_ORDER_UNSET};

/// Fields for an attachment row about to be created.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub document_id: Uuid,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: String,
}

/// PostgreSQL implementation of the attachment repository.
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    /// Create a new PgAttachmentRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List a document's attachments in final display order.
    pub async fn list_by_document(&self, document_id: Uuid) -> Result<Vec<Attachment>> {
        let rows = sqlx::query(ATTACHMENT_LIST)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(attachment_from_row).collect())
    }

    /// Transaction-aware variant of list_by_document.
    pub async fn list_by_document_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
    ) -> Result<Vec<Attachment>> {
        let rows = sqlx::query(ATTACHMENT_LIST)
            .bind(document_id)
            .fetch_all(&mut **tx)
            .await?;
        Ok(rows.iter().map(attachment_from_row).collect())
    }

    /// Get an attachment by id.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Attachment> {
        let row = sqlx::query(
            r#"SELECT id, document_id, file_path, file_name, mime_type, sort_order, created_at
               FROM attachment WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(Error::AttachmentNotFound(id))?;
        Ok(attachment_from_row(&row))
    }

    /// Insert an attachment at the unset sentinel order; a later
    /// reorder pass (or the end-of-list append rule) places it.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: NewAttachment,
    ) -> Result<Attachment> {
        let id = new_v7();
        let row = sqlx::query(
            r#"INSERT INTO attachment (id, document_id, file_path, file_name, mime_type, sort_order)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, document_id, file_path, file_name, mime_type, sort_order, created_at"#,
        )
        .bind(id)
        .bind(new.document_id)
        .bind(&new.file_path)
        .bind(&new.file_name)
        .bind(&new.mime_type)
        .bind(SORT_ORDER_UNSET)
        .fetch_one(&mut **tx)
        .await?;

        Ok(attachment_from_row(&row))
    }

    /// Assign an explicit sort order.
    pub async fn set_order_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        sort_order: i32,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE attachment SET sort_order = $2 WHERE id = $1")
            .bind(id)
            .bind(sort_order)
            .execute(&mut **tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::AttachmentNotFound(id));
        }
        Ok(())
    }

    /// Delete an attachment row.
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM attachment WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::AttachmentNotFound(id));
        }
        Ok(())
    }
}

// Sentinel (-1) rows sort after every explicitly ordered row, in
// creation order: created-before-ordered appends at the end.
const ATTACHMENT_LIST: &str = r#"SELECT id, document_id, file_path, file_name, mime_type, sort_order, created_at
    FROM attachment
    WHERE document_id = $1
    ORDER BY (sort_order < 0), sort_order, created_at"#;

/// Convert a database row to an Attachment.
fn attachment_from_row(row: &sqlx::postgres::PgRow) -> Attachment {
    Attachment {
        id: row.get("id"),
        document_id: row.get("document_id"),
        file_path: row.get("file_path"),
        file_name: row.get("file_name"),
        mime_type: row.get("mime_type"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
    }
}
