//! Staging store client: the blob-side half of the composition engine.
//!
//! Blobs live in one of two zones:
//! - `tmp/…` — staged uploads, not yet part of any document
//! - `{category}/…` — permanent, category-scoped blobs referenced by
//!   relational rows
//!
//! Promotion copies a staged blob into a category and removes the temp
//! copy. Neither promotion nor upload participates in any relational
//! transaction; every key they return during a commit attempt must be
//! tracked by the caller for compensating deletion.

use arkiv_core::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::StorageBackend;

/// Permanent storage zones, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCategory {
    /// Main document files.
    Documents,
    /// Attachment files.
    Attachments,
    /// Derived combined-PDF artifacts.
    Combined,
}

impl StorageCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageCategory::Documents => "documents",
            StorageCategory::Attachments => "attachments",
            StorageCategory::Combined => "combined",
        }
    }
}

/// Result of a permanent upload.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub key: String,
    pub size: i64,
    pub hash: String,
    pub mime_type: String,
}

/// Result of promoting a staged blob.
#[derive(Debug, Clone)]
pub struct PromotedBlob {
    pub key: String,
    pub size: i64,
    pub hash: String,
    pub mime_type: String,
}

/// Metadata about a stored blob.
#[derive(Debug, Clone)]
pub struct BlobInfo {
    pub size: u64,
    pub mime_type: String,
    pub last_modified: Option<std::time::SystemTime>,
}

/// Result of staging an upload; the only legal origin of a `temp_key`.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub temp_key: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
}

/// Object-safe blob store interface the engine is injected with.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a staged blob. Returns the handle the client echoes back
    /// inside a change-set.
    async fn stage(
        &self,
        data: &[u8],
        original_name: &str,
        mime_type: &str,
    ) -> Result<StagedUpload>;

    /// Copy a staged blob to a permanent, category-scoped key and
    /// remove the temp copy.
    async fn promote(&self, temp_key: &str, category: StorageCategory) -> Result<PromotedBlob>;

    /// Write a permanent blob directly (used for derived artifacts).
    async fn upload(
        &self,
        data: &[u8],
        original_name: &str,
        mime_type: &str,
        category: StorageCategory,
    ) -> Result<StoredBlob>;

    /// Read a blob.
    async fn download(&self, key: &str) -> Result<Vec<u8>>;

    /// Metadata about a blob.
    async fn info(&self, key: &str) -> Result<BlobInfo>;

    /// Delete a blob, never raising. Deletion failures must not block
    /// a compositional decision; they are logged and swallowed.
    async fn safe_delete(&self, key: &str);

    /// Whether a blob exists. Used by consistency checks and tests.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Compute BLAKE3 hash of data with "blake3:" prefix.
///
/// Returns a string in the format: `blake3:{64-char-hex}`
pub fn compute_content_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    format!("blake3:{}", hash.to_hex())
}

/// Generate a permanent blob key.
///
/// Key format: `{category}/{first-2-hex}/{next-2-hex}/{uuid}.bin`
pub fn generate_blob_key(category: StorageCategory, uuid: &Uuid) -> String {
    let hex = uuid.as_hyphenated().to_string().replace('-', "");
    format!(
        "{}/{}/{}/{}.bin",
        category.as_str(),
        &hex[0..2],
        &hex[2..4],
        uuid.as_hyphenated()
    )
}

/// Generate a temp blob key for a staged upload.
pub fn generate_temp_key(uuid: &Uuid) -> String {
    let hex = uuid.as_hyphenated().to_string().replace('-', "");
    format!("tmp/{}/{}.bin", &hex[0..2], uuid.as_hyphenated())
}

/// Whether a key points into the staging zone.
pub fn is_temp_key(key: &str) -> bool {
    key.starts_with("tmp/")
}

/// Staging store over a pluggable raw backend.
pub struct StagingStore {
    backend: Box<dyn StorageBackend>,
}

impl StagingStore {
    /// Create a new staging store.
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    fn sniff_mime(data: &[u8], declared: &str) -> String {
        if !declared.is_empty() {
            return declared.to_string();
        }
        infer::get(data)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

#[async_trait]
impl BlobStore for StagingStore {
    async fn stage(
        &self,
        data: &[u8],
        original_name: &str,
        mime_type: &str,
    ) -> Result<StagedUpload> {
        let temp_key = generate_temp_key(&Uuid::now_v7());
        self.backend
            .write(&temp_key, data)
            .await
            .map_err(|e| Error::Storage(format!("stage {}: {}", temp_key, e)))?;
        debug!(blob_key = %temp_key, size_bytes = data.len(), "staging: staged upload");
        Ok(StagedUpload {
            temp_key,
            original_name: original_name.to_string(),
            mime_type: Self::sniff_mime(data, mime_type),
            size: data.len() as i64,
        })
    }

    async fn promote(&self, temp_key: &str, category: StorageCategory) -> Result<PromotedBlob> {
        if !is_temp_key(temp_key) {
            return Err(Error::Storage(format!(
                "promote: not a staged key: {}",
                temp_key
            )));
        }

        let data = self
            .backend
            .read(temp_key)
            .await
            .map_err(|e| Error::Storage(format!("promote: read {}: {}", temp_key, e)))?;

        let key = generate_blob_key(category, &Uuid::now_v7());
        self.backend
            .write(&key, &data)
            .await
            .map_err(|e| Error::Storage(format!("promote: write {}: {}", key, e)))?;

        // The temp copy is redundant from here on. If this delete
        // fails, the engine's temp-key safety net removes it after
        // commit, so a failure is only worth a warning.
        if let Err(e) = self.backend.delete(temp_key).await {
            warn!(blob_key = %temp_key, error = %e, "staging: temp delete after promote failed");
        }

        debug!(from = %temp_key, blob_key = %key, size_bytes = data.len(), "staging: promoted");
        Ok(PromotedBlob {
            key,
            size: data.len() as i64,
            hash: compute_content_hash(&data),
            mime_type: Self::sniff_mime(&data, ""),
        })
    }

    async fn upload(
        &self,
        data: &[u8],
        original_name: &str,
        mime_type: &str,
        category: StorageCategory,
    ) -> Result<StoredBlob> {
        let key = generate_blob_key(category, &Uuid::now_v7());
        self.backend
            .write(&key, data)
            .await
            .map_err(|e| Error::Storage(format!("upload {} ({}): {}", key, original_name, e)))?;
        debug!(blob_key = %key, size_bytes = data.len(), "staging: uploaded");
        Ok(StoredBlob {
            key,
            size: data.len() as i64,
            hash: compute_content_hash(data),
            mime_type: Self::sniff_mime(data, mime_type),
        })
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        self.backend
            .read(key)
            .await
            .map_err(|e| Error::Storage(format!("download {}: {}", key, e)))
    }

    async fn info(&self, key: &str) -> Result<BlobInfo> {
        let (size, last_modified) = self
            .backend
            .stat(key)
            .await
            .map_err(|e| Error::Storage(format!("info {}: {}", key, e)))?;
        // Keys carry no type information, so the mime is re-sniffed
        // from the stored bytes.
        let data = self
            .backend
            .read(key)
            .await
            .map_err(|e| Error::Storage(format!("info {}: {}", key, e)))?;
        Ok(BlobInfo {
            size,
            mime_type: Self::sniff_mime(&data, ""),
            last_modified,
        })
    }

    async fn safe_delete(&self, key: &str) {
        match self.backend.delete(key).await {
            Ok(()) => debug!(blob_key = %key, "staging: deleted"),
            Err(e) => {
                // Post-commit and compensating cleanup must never fail
                // the commit decision; the authoritative relational
                // state is already settled at this point.
                warn!(blob_key = %key, error = %e, "staging: delete failed, ignoring");
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use std::sync::Arc;

    fn store() -> StagingStore {
        StagingStore::new(MemoryBackend::new())
    }

    #[tokio::test]
    async fn test_stage_then_promote_moves_blob() {
        let store = store();
        let staged = store.stage(b"%PDF-1.7 data", "report.pdf", "application/pdf").await.unwrap();
        assert!(is_temp_key(&staged.temp_key));
        assert_eq!(staged.size, 13);

        let promoted = store
            .promote(&staged.temp_key, StorageCategory::Documents)
            .await
            .unwrap();
        assert!(promoted.key.starts_with("documents/"));
        assert_eq!(promoted.hash, compute_content_hash(b"%PDF-1.7 data"));

        // Temp copy is gone, permanent copy resolves.
        assert!(!store.exists(&staged.temp_key).await.unwrap());
        assert_eq!(store.download(&promoted.key).await.unwrap(), b"%PDF-1.7 data");
    }

    #[tokio::test]
    async fn test_promote_missing_temp_key_is_storage_error() {
        let store = store();
        let err = store
            .promote("tmp/ab/missing.bin", StorageCategory::Documents)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_promote_rejects_permanent_key() {
        let store = store();
        let err = store
            .promote("documents/aa/bb/x.bin", StorageCategory::Combined)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_upload_goes_to_category() {
        let store = store();
        let stored = store
            .upload(b"%PDF-1.4 merged", "combined.pdf", "application/pdf", StorageCategory::Combined)
            .await
            .unwrap();
        assert!(stored.key.starts_with("combined/"));
        assert_eq!(stored.mime_type, "application/pdf");

        let info = store.info(&stored.key).await.unwrap();
        assert_eq!(info.size, 15);
        assert_eq!(info.mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_safe_delete_swallows_missing_key() {
        let store = store();
        // Must not panic or propagate anything.
        store.safe_delete("documents/aa/bb/never-existed.bin").await;
    }

    #[tokio::test]
    async fn test_blob_keys_are_scoped_and_unique() {
        let id = Uuid::now_v7();
        let key = generate_blob_key(StorageCategory::Attachments, &id);
        assert!(key.starts_with("attachments/"));
        assert!(key.ends_with(".bin"));
        assert!(key.contains(&id.to_string()));
        assert_ne!(
            generate_blob_key(StorageCategory::Attachments, &Uuid::now_v7()),
            generate_blob_key(StorageCategory::Attachments, &Uuid::now_v7())
        );
    }

    #[tokio::test]
    async fn test_store_is_object_safe() {
        let store: Arc<dyn BlobStore> = Arc::new(store());
        let staged = store.stage(b"x", "x.txt", "text/plain").await.unwrap();
        assert!(store.exists(&staged.temp_key).await.unwrap());
    }
}
