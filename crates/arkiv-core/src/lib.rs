//! # arkiv-core
//!
//! Core types, traits, and abstractions for arkiv's document
//! composition engine.
//!
//! This crate provides:
//! - The change-set model and its shape validation
//! - Persisted domain entities (document, attachment, converted PDF)
//! - The closed mime capability table
//! - The shared `Error`/`Result` types
//! - Structured logging field constants

pub mod access_code;
pub mod changeset;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod mime;
pub mod models;
pub mod traits;
pub mod uuid_utils;

pub use access_code::{hash_access_code, verify_access_code};
pub use changeset::{ChangeSet, MetadataPatch, ReorderEntry, StagedFileRef};
pub use error::{Error, Result};
pub use mime::SupportedMime;
pub use models::{
    Actor, Attachment, AuditAction, AuditEntry, Category, ComposeReceipt, ConvertedDocument,
    Document, JobKind, Role, SORT_ORDER_UNSET,
};
pub use traits::TaskQueue;
pub use uuid_utils::new_v7;
