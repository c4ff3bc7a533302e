//! # arkiv-engine
//!
//! Document composition and consistency engine for arkiv.
//!
//! This crate provides:
//! - [`ComposeEngine`] — applies one change-set as a logically atomic
//!   operation spanning blob storage, the relational store, and a
//!   synchronous combined-PDF rebuild, with explicit compensation on
//!   failure
//! - [`PdfCombiner`] — ensures every input is PDF and merges them in
//!   order into one combined artifact
//! - [`CommitTracker`] — the per-attempt saga ledger of blob keys
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use arkiv_engine::ComposeEngine;
//! use arkiv_store::{FilesystemBackend, StagingStore};
//! use arkiv_convert::HttpConversionBackend;
//! use arkiv_db::{create_pool, PgJobQueue};
//!
//! let pool = create_pool(&database_url).await?;
//! let engine = ComposeEngine::new(
//!     pool.clone(),
//!     Arc::new(StagingStore::new(FilesystemBackend::new("/var/arkiv/blobs"))),
//!     Arc::new(HttpConversionBackend::from_env()?),
//!     Arc::new(PgJobQueue::new(pool)),
//! );
//!
//! let receipt = engine.compose_create(change_set, actor).await?;
//! ```

pub mod combine;
pub mod engine;
mod executor;
pub mod tracker;

// Re-export core types
pub use arkiv_core::*;

pub use combine::{CombinedPdf, PdfCombiner};
pub use engine::ComposeEngine;
pub use tracker::CommitTracker;
