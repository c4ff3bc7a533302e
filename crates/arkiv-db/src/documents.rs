//! Document repository implementation.
//!
//! Every mutation is transaction-scoped: the composition engine owns
//! the transaction so that a failed commit rolls every row back at
//! once. Plain pool-scoped variants exist only for reads.

use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use arkiv_core::{new_v7, Document, Error, Result};

/// Fields for a document row about to be created.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub author_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub content_hash: String,
    pub is_confidential: bool,
    pub is_secret: bool,
    pub access_code_hash: Option<String>,
}

/// PostgreSQL implementation of the document repository.
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    /// Create a new PgDocumentRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a document by id.
    pub async fn get(&self, id: Uuid) -> Result<Document> {
        let row = sqlx::query(DOCUMENT_SELECT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::DocumentNotFound(id))?;
        Ok(document_from_row(&row))
    }

    /// Transaction-aware variant of get.
    pub async fn get_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Document> {
        let row = sqlx::query(DOCUMENT_SELECT)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(Error::DocumentNotFound(id))?;
        Ok(document_from_row(&row))
    }

    /// Insert a new document row. `main_pdf_id` starts NULL and is
    /// linked once the combined PDF record exists.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: NewDocument,
    ) -> Result<Document> {
        let id = new_v7();
        let row = sqlx::query(
            r#"INSERT INTO document
               (id, author_id, title, description, keywords, file_path, file_name,
                file_size, mime_type, content_hash, is_confidential, is_secret,
                access_code_hash)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
               RETURNING id, author_id, title, description, keywords, file_path,
                         file_name, file_size, mime_type, content_hash,
                         is_confidential, is_secret, access_code_hash, main_pdf_id,
                         created_at, updated_at"#,
        )
        .bind(id)
        .bind(new.author_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.keywords)
        .bind(&new.file_path)
        .bind(&new.file_name)
        .bind(new.file_size)
        .bind(&new.mime_type)
        .bind(&new.content_hash)
        .bind(new.is_confidential)
        .bind(new.is_secret)
        .bind(&new.access_code_hash)
        .fetch_one(&mut **tx)
        .await?;

        Ok(document_from_row(&row))
    }

    /// Write back every mutable column of a document row.
    ///
    /// The executor loads the row, applies the change-set to the
    /// struct, and persists the result in one statement; concurrent
    /// updates are last-writer-wins.
    pub async fn update_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        doc: &Document,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE document
               SET title = $2, description = $3, keywords = $4, file_path = $5,
                   file_name = $6, file_size = $7, mime_type = $8, content_hash = $9,
                   is_confidential = $10, is_secret = $11, access_code_hash = $12,
                   main_pdf_id = $13, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(doc.id)
        .bind(&doc.title)
        .bind(&doc.description)
        .bind(&doc.keywords)
        .bind(&doc.file_path)
        .bind(&doc.file_name)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(&doc.content_hash)
        .bind(doc.is_confidential)
        .bind(doc.is_secret)
        .bind(&doc.access_code_hash)
        .bind(doc.main_pdf_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(doc.id));
        }
        Ok(())
    }

    /// Link the current combined-PDF record.
    pub async fn set_main_pdf_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        converted_id: Option<Uuid>,
    ) -> Result<()> {
        sqlx::query("UPDATE document SET main_pdf_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(document_id)
            .bind(converted_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Duplicate-content guard for create: id of an existing document
    /// with the same content hash, if any.
    pub async fn find_id_by_hash_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        content_hash: &str,
    ) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar("SELECT id FROM document WHERE content_hash = $1 LIMIT 1")
            .bind(content_hash)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(id)
    }

    /// Replace the document's category links.
    pub async fn replace_categories_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("DELETE FROM document_category WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut **tx)
            .await?;
        for category_id in category_ids {
            sqlx::query(
                "INSERT INTO document_category (document_id, category_id) VALUES ($1, $2)",
            )
            .bind(document_id)
            .bind(category_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Category ids linked to a document.
    pub async fn list_categories_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT category_id FROM document_category WHERE document_id = $1",
        )
        .bind(document_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(ids)
    }

    /// Replace the per-user confidential-access allow-list.
    pub async fn replace_confidential_access_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("DELETE FROM confidential_access WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut **tx)
            .await?;
        for user_id in user_ids {
            sqlx::query("INSERT INTO confidential_access (document_id, user_id) VALUES ($1, $2)")
                .bind(document_id)
                .bind(user_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// Clear the allow-list entirely (confidentiality turned off).
    pub async fn clear_confidential_access_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
    ) -> Result<()> {
        sqlx::query("DELETE FROM confidential_access WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// User ids on the allow-list.
    pub async fn list_confidential_access_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let ids =
            sqlx::query_scalar("SELECT user_id FROM confidential_access WHERE document_id = $1")
                .bind(document_id)
                .fetch_all(&mut **tx)
                .await?;
        Ok(ids)
    }

    /// Delete a document row (cascades to attachments, categories,
    /// allow-list, and converted records).
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        // The main_pdf_id FK restricts deleting the converted row a
        // document still points at, so unlink first.
        sqlx::query("UPDATE document SET main_pdf_id = NULL WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        let result = sqlx::query("DELETE FROM document WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        Ok(())
    }
}

const DOCUMENT_SELECT: &str = r#"SELECT id, author_id, title, description, keywords, file_path,
           file_name, file_size, mime_type, content_hash, is_confidential,
           is_secret, access_code_hash, main_pdf_id, created_at, updated_at
    FROM document WHERE id = $1"#;

/// Convert a database row to a Document.
fn document_from_row(row: &sqlx::postgres::PgRow) -> Document {
    Document {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        description: row.get("description"),
        keywords: row.get("keywords"),
        file_path: row.get("file_path"),
        file_name: row.get("file_name"),
        file_size: row.get("file_size"),
        mime_type: row.get("mime_type"),
        content_hash: row.get("content_hash"),
        is_confidential: row.get("is_confidential"),
        is_secret: row.get("is_secret"),
        access_code_hash: row.get("access_code_hash"),
        main_pdf_id: row.get("main_pdf_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
