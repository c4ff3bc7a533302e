//! Converted-document (combined PDF) repository implementation.

use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use arkiv_core::{new_v7, ConvertedDocument, Error, Result};

/// Fields for a converted-document row about to be created.
#[derive(Debug, Clone)]
pub struct NewConvertedDocument {
    pub document_id: Uuid,
    pub file_path: String,
    pub file_size: i64,
    pub original_file: String,
}

/// PostgreSQL implementation of the converted-document repository.
pub struct PgConvertedDocumentRepository {
    pool: PgPool,
}

impl PgConvertedDocumentRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a converted record by id.
    pub async fn get(&self, id: Uuid) -> Result<ConvertedDocument> {
        let row = sqlx::query(CONVERTED_SELECT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("converted document {}", id)))?;
        Ok(converted_from_row(&row))
    }

    /// Insert a new combined-PDF record.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: NewConvertedDocument,
    ) -> Result<ConvertedDocument> {
        let id = new_v7();
        let row = sqlx::query(
            r#"INSERT INTO converted_document
               (id, document_id, conversion_type, file_path, file_size, original_file)
               VALUES ($1, $2, 'pdf', $3, $4, $5)
               RETURNING id, document_id, conversion_type, file_path, file_size,
                         original_file, created_at"#,
        )
        .bind(id)
        .bind(new.document_id)
        .bind(&new.file_path)
        .bind(new.file_size)
        .bind(&new.original_file)
        .fetch_one(&mut **tx)
        .await?;

        Ok(converted_from_row(&row))
    }

    /// The document's current converted records (at most one current,
    /// but supersede windows can briefly hold two inside a tx).
    pub async fn find_by_document_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
    ) -> Result<Vec<ConvertedDocument>> {
        let rows = sqlx::query(
            r#"SELECT id, document_id, conversion_type, file_path, file_size,
                      original_file, created_at
               FROM converted_document WHERE document_id = $1 ORDER BY created_at"#,
        )
        .bind(document_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows.iter().map(converted_from_row).collect())
    }

    /// Delete a superseded converted record.
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM converted_document WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

const CONVERTED_SELECT: &str = r#"SELECT id, document_id, conversion_type, file_path, file_size,
           original_file, created_at
    FROM converted_document WHERE id = $1"#;

/// Convert a database row to a ConvertedDocument.
fn converted_from_row(row: &sqlx::postgres::PgRow) -> ConvertedDocument {
    ConvertedDocument {
        id: row.get("id"),
        document_id: row.get("document_id"),
        conversion_type: row.get("conversion_type"),
        file_path: row.get("file_path"),
        file_size: row.get("file_size"),
        original_file: row.get("original_file"),
        created_at: row.get("created_at"),
    }
}
