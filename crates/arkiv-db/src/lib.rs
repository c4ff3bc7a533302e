//! # arkiv-db
//!
//! PostgreSQL relational layer for arkiv.
//!
//! This crate provides:
//! - Connection pool management
//! - Transaction-scoped repositories for document, attachment,
//!   category link, confidential-access, and converted-PDF rows
//! - The audit log sink (written inside the mutation's transaction)
//! - The job queue the engine enqueues reindex work into
//!
//! Mutating repository methods carry a `_tx` suffix and take the
//! caller's `sqlx::Transaction`; the composition engine owns commit
//! and rollback so a partial change-set is never visible.

pub mod attachments;
pub mod audit;
pub mod converted;
pub mod documents;
pub mod jobs;
pub mod pool;

// Always compiled so integration tests (in tests/) can use the fixtures.
pub mod test_fixtures;

// Re-export core types
pub use arkiv_core::*;

pub use attachments::{NewAttachment, PgAttachmentRepository};
pub use audit::PgAuditLog;
pub use converted::{NewConvertedDocument, PgConvertedDocumentRepository};
pub use documents::{NewDocument, PgDocumentRepository};
pub use jobs::PgJobQueue;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
