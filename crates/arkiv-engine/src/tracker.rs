//! The saga ledger of one commit attempt.
//!
//! Blob-store promotions and uploads are not part of the relational
//! transaction and cannot be rolled back by it, so every key produced
//! during an attempt is recorded here and settled once the relational
//! outcome is known:
//!
//! - `promoted` — blobs created this attempt; deleted on failure
//! - `temp` — staged blobs consumed; deleted on success as a safety
//!   net, whether or not promotion already removed them
//! - `cleanup_on_success` — superseded old blobs; deleted only after
//!   the transaction has committed, never before

use arkiv_store::BlobStore;
use tracing::debug;

/// Key lists accumulated across one commit attempt.
#[derive(Debug, Default)]
pub struct CommitTracker {
    promoted: Vec<String>,
    temp: Vec<String>,
    cleanup_on_success: Vec<String>,
}

impl CommitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a blob created by this attempt.
    pub fn track_promoted(&mut self, key: impl Into<String>) {
        self.promoted.push(key.into());
    }

    /// Record a staged temp blob consumed by this attempt.
    pub fn track_temp(&mut self, key: impl Into<String>) {
        self.temp.push(key.into());
    }

    /// Record an old blob to delete only after a successful commit.
    pub fn track_cleanup_on_success(&mut self, key: impl Into<String>) {
        self.cleanup_on_success.push(key.into());
    }

    pub fn promoted_keys(&self) -> &[String] {
        &self.promoted
    }

    pub fn cleanup_keys(&self) -> &[String] {
        &self.cleanup_on_success
    }

    /// Compensate a failed attempt: delete every newly created blob,
    /// most recent first. Best-effort; the relational rollback already
    /// restored the authoritative state, so old blobs stay untouched.
    pub async fn compensate(&self, blobs: &dyn BlobStore) {
        debug!(
            promoted = self.promoted.len(),
            "compose: compensating failed attempt"
        );
        for key in self.promoted.iter().rev() {
            blobs.safe_delete(key).await;
        }
    }

    /// Settle a committed attempt: superseded blobs first, then the
    /// consumed temp blobs. Best-effort.
    pub async fn finalize(&self, blobs: &dyn BlobStore) {
        debug!(
            superseded = self.cleanup_on_success.len(),
            temp = self.temp.len(),
            "compose: post-commit cleanup"
        );
        for key in &self.cleanup_on_success {
            blobs.safe_delete(key).await;
        }
        for key in &self.temp {
            blobs.safe_delete(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkiv_store::{BlobStore, MemoryBackend, StagingStore, StorageCategory};

    async fn seeded_store() -> (StagingStore, Vec<String>) {
        let store = StagingStore::new(MemoryBackend::new());
        let mut keys = Vec::new();
        for i in 0..3 {
            let blob = store
                .upload(
                    format!("blob {}", i).as_bytes(),
                    "x.pdf",
                    "application/pdf",
                    StorageCategory::Documents,
                )
                .await
                .unwrap();
            keys.push(blob.key);
        }
        (store, keys)
    }

    #[tokio::test]
    async fn test_compensate_deletes_promoted_only() {
        let (store, keys) = seeded_store().await;
        let mut tracker = CommitTracker::new();
        tracker.track_promoted(&keys[0]);
        tracker.track_promoted(&keys[1]);
        tracker.track_cleanup_on_success(&keys[2]);

        tracker.compensate(&store).await;

        assert!(!store.exists(&keys[0]).await.unwrap());
        assert!(!store.exists(&keys[1]).await.unwrap());
        // Old blobs survive a failed attempt: the document still
        // points at them after rollback.
        assert!(store.exists(&keys[2]).await.unwrap());
    }

    #[tokio::test]
    async fn test_finalize_deletes_superseded_and_temp() {
        let (store, keys) = seeded_store().await;
        let staged = store.stage(b"tmp", "t.txt", "text/plain").await.unwrap();

        let mut tracker = CommitTracker::new();
        tracker.track_promoted(&keys[0]);
        tracker.track_cleanup_on_success(&keys[1]);
        tracker.track_temp(&staged.temp_key);

        tracker.finalize(&store).await;

        // Newly promoted blobs survive a successful commit.
        assert!(store.exists(&keys[0]).await.unwrap());
        assert!(!store.exists(&keys[1]).await.unwrap());
        assert!(!store.exists(&staged.temp_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_compensate_tolerates_missing_blobs() {
        let (store, _keys) = seeded_store().await;
        let mut tracker = CommitTracker::new();
        tracker.track_promoted("documents/aa/bb/never-existed.bin");
        // Must not panic; safe_delete swallows.
        tracker.compensate(&store).await;
    }
}
