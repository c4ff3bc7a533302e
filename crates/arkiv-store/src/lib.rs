//! # arkiv-store
//!
//! Blob and staging storage layer for arkiv.
//!
//! This crate provides:
//! - A pluggable [`StorageBackend`] (filesystem, in-memory)
//! - The [`BlobStore`] staging client: stage → promote → permanent,
//!   plus direct uploads for derived artifacts
//! - BLAKE3 content hashing
//!
//! ## Example
//!
//! ```rust,ignore
//! use arkiv_store::{FilesystemBackend, StagingStore, StorageCategory, BlobStore};
//!
//! let store = StagingStore::new(FilesystemBackend::new("/var/arkiv/blobs"));
//! let staged = store.stage(&data, "report.docx", mime).await?;
//! let promoted = store.promote(&staged.temp_key, StorageCategory::Documents).await?;
//! ```

pub mod backend;
pub mod memory;
pub mod staging;

// Re-export core types
pub use arkiv_core::{Error, Result};

pub use backend::{FilesystemBackend, StorageBackend};
pub use memory::MemoryBackend;
pub use staging::{
    compute_content_hash, generate_blob_key, generate_temp_key, is_temp_key, BlobInfo, BlobStore,
    PromotedBlob, StagedUpload, StagingStore, StorageCategory, StoredBlob,
};
