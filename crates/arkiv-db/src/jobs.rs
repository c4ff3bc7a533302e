//! Job queue implementation.
//!
//! The engine only produces jobs; workers consuming them (indexers,
//! content recomputation) live outside this repository. Enqueueing is
//! fire-and-forget with at-least-once delivery assumed downstream.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use arkiv_core::{new_v7, JobKind, Result, TaskQueue};

/// PostgreSQL implementation of [`TaskQueue`].
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    /// Create a new PgJobQueue with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskQueue for PgJobQueue {
    async fn enqueue(&self, kind: JobKind, document_id: Uuid) -> Result<Uuid> {
        let job_id = new_v7();
        sqlx::query(
            r#"INSERT INTO job_queue (id, job_kind, document_id, status)
               VALUES ($1, $2, $3, 'pending')"#,
        )
        .bind(job_id)
        .bind(kind.as_str())
        .bind(document_id)
        .execute(&self.pool)
        .await?;

        debug!(job_kind = kind.as_str(), document_id = %document_id, "jobs: enqueued");
        Ok(job_id)
    }
}
