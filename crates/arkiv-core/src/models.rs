//! Core data models for arkiv.
//!
//! These types are shared across all arkiv crates and represent the
//! persisted domain entities plus the actor/job/audit types the
//! composition engine exchanges with its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel `sort_order` for attachments created but not yet ordered.
///
/// Rows carrying this value sort after every explicitly ordered row
/// (created-before-ordered semantics), not before them.
pub const SORT_ORDER_UNSET: i32 = -1;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// A document row. Identity is immutable; everything else is mutated
/// exclusively by a successful composition commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    /// Blob key of the current main file. Must resolve to an existing
    /// blob whenever this row is visible to readers.
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub content_hash: String,
    pub is_confidential: bool,
    pub is_secret: bool,
    pub access_code_hash: Option<String>,
    /// Current combined-PDF record, if one has been produced.
    pub main_pdf_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An attachment row belonging to one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub document_id: Uuid,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: String,
    /// Ascending display/merge order. Values need not be contiguous;
    /// [`SORT_ORDER_UNSET`] rows append at the end.
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Derived combined-PDF record. A document has at most one current
/// converted record, referenced by `Document::main_pdf_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedDocument {
    pub id: Uuid,
    pub document_id: Uuid,
    pub conversion_type: String,
    pub file_path: String,
    pub file_size: i64,
    pub original_file: String,
    pub created_at: DateTime<Utc>,
}

/// A document category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

// =============================================================================
// ACTOR TYPES
// =============================================================================

/// Role of the acting user, as established by the (out-of-scope)
/// authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Editor,
    Admin,
}

impl Role {
    /// Elevated roles may mutate documents they did not author.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Editor | Role::Admin)
    }
}

/// The authenticated user on whose behalf a commit runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    /// Whether this actor may mutate the given document.
    pub fn may_edit(&self, document: &Document) -> bool {
        self.user_id == document.author_id || self.role.is_elevated()
    }
}

// =============================================================================
// JOB / AUDIT TYPES
// =============================================================================

/// Background jobs the engine enqueues after a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// Reindex metadata only.
    IndexDocument,
    /// Recompute extracted content, then reindex.
    UpdateContentAndReindex,
    /// Remove a retired document from the index.
    RemoveFromIndex,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::IndexDocument => "index-document",
            JobKind::UpdateContentAndReindex => "update-content-and-reindex",
            JobKind::RemoveFromIndex => "remove-from-index",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "document.create",
            AuditAction::Update => "document.update",
            AuditAction::Delete => "document.delete",
        }
    }
}

/// One audit row, written inside the same transaction as the mutation
/// it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub document_id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    /// Names of the fields the commit changed, e.g. `["title"]` for a
    /// metadata-only title edit.
    pub changed_fields: Vec<String>,
}

/// Receipt returned by a successful composition commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeReceipt {
    pub document_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(author: Uuid) -> Document {
        Document {
            id: Uuid::new_v4(),
            author_id: author,
            title: "t".into(),
            description: None,
            keywords: vec![],
            file_path: "documents/x".into(),
            file_name: "x.pdf".into(),
            file_size: 1,
            mime_type: "application/pdf".into(),
            content_hash: "blake3:0".into(),
            is_confidential: false,
            is_secret: false,
            access_code_hash: None,
            main_pdf_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_author_may_edit_own_document() {
        let author = Uuid::new_v4();
        let actor = Actor {
            user_id: author,
            role: Role::Reader,
        };
        assert!(actor.may_edit(&doc(author)));
    }

    #[test]
    fn test_reader_may_not_edit_foreign_document() {
        let actor = Actor {
            user_id: Uuid::new_v4(),
            role: Role::Reader,
        };
        assert!(!actor.may_edit(&doc(Uuid::new_v4())));
    }

    #[test]
    fn test_elevated_roles_may_edit_foreign_document() {
        for role in [Role::Editor, Role::Admin] {
            let actor = Actor {
                user_id: Uuid::new_v4(),
                role,
            };
            assert!(actor.may_edit(&doc(Uuid::new_v4())));
        }
    }

    #[test]
    fn test_job_kind_names() {
        assert_eq!(JobKind::IndexDocument.as_str(), "index-document");
        assert_eq!(
            JobKind::UpdateContentAndReindex.as_str(),
            "update-content-and-reindex"
        );
        assert_eq!(JobKind::RemoveFromIndex.as_str(), "remove-from-index");
    }

    #[test]
    fn test_audit_action_names() {
        assert_eq!(AuditAction::Create.as_str(), "document.create");
        assert_eq!(AuditAction::Update.as_str(), "document.update");
    }
}
