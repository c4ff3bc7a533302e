//! Service traits at the engine's seams.
//!
//! Collaborators the composition engine only enqueues into or notifies
//! are abstracted here so tests can substitute them. Storage and
//! conversion traits live with their implementations in `arkiv-store`
//! and `arkiv-convert`.

use crate::{JobKind, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Fire-and-forget background task queue, at-least-once delivery.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a job referencing a document. Returns the job id.
    async fn enqueue(&self, kind: JobKind, document_id: Uuid) -> Result<Uuid>;
}
