//! The composition engine: one logically atomic commit per change-set.
//!
//! A commit attempt walks Validating → Promoting → Mutating →
//! Combining → Committing → PostCommitCleanup → Reindexing. Any
//! failure before the commit point rolls the relational transaction
//! back and routes through compensation, which deletes every blob the
//! attempt created. Cleanup failures in either direction are logged,
//! never propagated: by then the authoritative relational state is
//! already settled.

use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use arkiv_convert::ConversionBackend;
use arkiv_core::{
    Actor, AuditAction, AuditEntry, ChangeSet, ComposeReceipt, Error, JobKind, Result, TaskQueue,
};
use arkiv_db::{
    PgAttachmentRepository, PgAuditLog, PgConvertedDocumentRepository, PgDocumentRepository,
};
use arkiv_store::BlobStore;

use crate::combine::PdfCombiner;
use crate::tracker::CommitTracker;

/// Document composition engine.
///
/// All collaborators are constructor-injected so tests can substitute
/// the blob store, conversion service, and job queue.
pub struct ComposeEngine {
    pool: PgPool,
    blobs: Arc<dyn BlobStore>,
    jobs: Arc<dyn TaskQueue>,
    documents: PgDocumentRepository,
    attachments: PgAttachmentRepository,
    converted: PgConvertedDocumentRepository,
    combiner: PdfCombiner,
}

impl ComposeEngine {
    /// Create a new engine over the given collaborators.
    pub fn new(
        pool: PgPool,
        blobs: Arc<dyn BlobStore>,
        converter: Arc<dyn ConversionBackend>,
        jobs: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            documents: PgDocumentRepository::new(pool.clone()),
            attachments: PgAttachmentRepository::new(pool.clone()),
            converted: PgConvertedDocumentRepository::new(pool.clone()),
            combiner: PdfCombiner::new(blobs.clone(), converter),
            pool,
            blobs,
            jobs,
        }
    }

    pub(crate) fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    pub(crate) fn documents(&self) -> &PgDocumentRepository {
        &self.documents
    }

    pub(crate) fn attachments(&self) -> &PgAttachmentRepository {
        &self.attachments
    }

    pub(crate) fn converted(&self) -> &PgConvertedDocumentRepository {
        &self.converted
    }

    pub(crate) fn combiner(&self) -> &PdfCombiner {
        &self.combiner
    }

    /// Create a document from a change-set.
    ///
    /// Either the whole change-set applies (document, attachments,
    /// combined PDF, audit entry) or nothing does.
    pub async fn compose_create(
        &self,
        change_set: ChangeSet,
        actor: Actor,
    ) -> Result<ComposeReceipt> {
        let start = Instant::now();
        change_set.validate()?;

        let mut tracker = CommitTracker::new();
        let outcome = async {
            let mut tx = self.pool.begin().await?;
            let document_id = self
                .apply_create(&mut tx, &change_set, actor, &mut tracker)
                .await?;
            tx.commit().await?;
            Ok::<Uuid, Error>(document_id)
        }
        .await;

        self.settle(
            "compose_create",
            outcome,
            tracker,
            change_set.operation_id.as_deref(),
            // A create always changes content.
            JobKind::UpdateContentAndReindex,
            start,
        )
        .await
    }

    /// Update a document from a change-set.
    pub async fn compose_update(
        &self,
        document_id: Uuid,
        change_set: ChangeSet,
        actor: Actor,
    ) -> Result<ComposeReceipt> {
        let start = Instant::now();
        change_set.validate()?;

        let job_kind = if change_set.changes_content() {
            JobKind::UpdateContentAndReindex
        } else {
            JobKind::IndexDocument
        };

        let mut tracker = CommitTracker::new();
        let outcome = async {
            let mut tx = self.pool.begin().await?;
            let document_id = self
                .apply_update(&mut tx, document_id, &change_set, actor, &mut tracker)
                .await?;
            tx.commit().await?;
            Ok::<Uuid, Error>(document_id)
        }
        .await;

        self.settle(
            "compose_update",
            outcome,
            tracker,
            change_set.operation_id.as_deref(),
            job_kind,
            start,
        )
        .await
    }

    /// Retire a document: delete its rows in one transaction, then
    /// remove its blobs and de-index it.
    pub async fn compose_delete(&self, document_id: Uuid, actor: Actor) -> Result<()> {
        let mut tracker = CommitTracker::new();
        let outcome = async {
            let mut tx = self.pool.begin().await?;
            let doc = self.documents.get_tx(&mut tx, document_id).await?;
            if !actor.may_edit(&doc) {
                return Err(Error::Forbidden(format!(
                    "user {} may not delete document {}",
                    actor.user_id, document_id
                )));
            }

            tracker.track_cleanup_on_success(&doc.file_path);
            for att in self
                .attachments
                .list_by_document_tx(&mut tx, document_id)
                .await?
            {
                tracker.track_cleanup_on_success(&att.file_path);
            }
            for conv in self
                .converted
                .find_by_document_tx(&mut tx, document_id)
                .await?
            {
                tracker.track_cleanup_on_success(&conv.file_path);
            }

            PgAuditLog::log_tx(
                &mut tx,
                &AuditEntry {
                    document_id,
                    actor_id: actor.user_id,
                    action: AuditAction::Delete,
                    changed_fields: vec![],
                },
            )
            .await?;
            self.documents.delete_tx(&mut tx, document_id).await?;
            tx.commit().await?;
            Ok::<Uuid, Error>(document_id)
        }
        .await;

        match outcome {
            Ok(document_id) => {
                tracker.finalize(self.blobs.as_ref()).await;
                self.enqueue_job(JobKind::RemoveFromIndex, document_id).await;
                info!(op = "compose_delete", document_id = %document_id, "compose: document retired");
                Ok(())
            }
            Err(e) => {
                // Nothing was promoted; compensation is a no-op, but
                // run it for symmetry with the other paths.
                tracker.compensate(self.blobs.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Settle one commit attempt: cleanup and reindex on success,
    /// compensation on failure, typed error re-raised unchanged.
    async fn settle(
        &self,
        op: &'static str,
        outcome: Result<Uuid>,
        tracker: CommitTracker,
        operation_id: Option<&str>,
        job_kind: JobKind,
        start: Instant,
    ) -> Result<ComposeReceipt> {
        match outcome {
            Ok(document_id) => {
                tracker.finalize(self.blobs.as_ref()).await;
                self.enqueue_job(job_kind, document_id).await;
                info!(
                    op,
                    document_id = %document_id,
                    operation_id = operation_id.unwrap_or(""),
                    job_kind = job_kind.as_str(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "compose: commit complete"
                );
                Ok(ComposeReceipt { document_id })
            }
            Err(e) => {
                tracker.compensate(self.blobs.as_ref()).await;
                if e.is_client_fault() {
                    debug!(op, operation_id = operation_id.unwrap_or(""), error = %e, "compose: commit rejected");
                } else {
                    error!(op, operation_id = operation_id.unwrap_or(""), error = %e, "compose: commit failed");
                }
                Err(e)
            }
        }
    }

    /// Post-commit job enqueue. Failures are logged, never propagated:
    /// the commit is already durable.
    async fn enqueue_job(&self, kind: JobKind, document_id: Uuid) {
        if let Err(e) = self.jobs.enqueue(kind, document_id).await {
            warn!(
                job_kind = kind.as_str(),
                document_id = %document_id,
                error = %e,
                "compose: reindex enqueue failed after commit"
            );
        }
    }
}
