//! The change-set: one caller-constructed description of every edit to
//! apply to a document in a single logically atomic commit.
//!
//! Shape validation lives here and runs before any side effect. Checks
//! that need persisted state (stale attachment ids, client-id
//! resolution against just-created rows) belong to the relational
//! executor, which runs them inside the commit transaction.

use crate::mime::SupportedMime;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Pointer to a blob already written to the staging area.
///
/// `client_id` is caller-chosen and unique within one change-set; it is
/// the only handle for attachments that do not yet have a persisted id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedFileRef {
    pub temp_key: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub client_id: String,
}

/// Metadata fields a change-set may touch. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_ids: Option<Vec<Uuid>>,
    pub keywords: Option<Vec<String>>,
    pub is_confidential: Option<bool>,
    pub is_secret: Option<bool>,
    /// Plaintext access code; hashed before it reaches the database.
    pub access_code: Option<String>,
    /// Full replacement for the confidential-access allow-list.
    pub confidential_user_ids: Option<Vec<Uuid>>,
}

impl MetadataPatch {
    /// Whether the patch touches anything at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category_ids.is_none()
            && self.keywords.is_none()
            && self.is_confidential.is_none()
            && self.is_secret.is_none()
            && self.access_code.is_none()
            && self.confidential_user_ids.is_none()
    }
}

/// One desired ordering assignment. Resolves through `attachment_id`
/// when present, otherwise through the change-set-local `client_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub client_id: Option<String>,
    pub attachment_id: Option<Uuid>,
    pub sort_order: i32,
}

/// The full description of edits a client wants applied to one
/// document in a single call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Client-generated idempotency token. Logged on the commit span;
    /// retries are not deduplicated (caller's responsibility).
    pub operation_id: Option<String>,
    pub metadata: Option<MetadataPatch>,
    pub replace_main: Option<StagedFileRef>,
    #[serde(default)]
    pub add_attachments: Vec<StagedFileRef>,
    #[serde(default)]
    pub delete_attachment_ids: Vec<Uuid>,
    #[serde(default)]
    pub reorder: Vec<ReorderEntry>,
}

impl ChangeSet {
    /// Whether the commit changes file content (as opposed to metadata
    /// only). Decides which reindex job gets enqueued.
    pub fn changes_content(&self) -> bool {
        self.replace_main.is_some()
            || !self.add_attachments.is_empty()
            || !self.delete_attachment_ids.is_empty()
    }

    /// Shape validation. Fatal on violation, no side effects.
    pub fn validate(&self) -> Result<()> {
        if self.metadata.as_ref().map_or(true, |m| m.is_empty())
            && self.replace_main.is_none()
            && self.add_attachments.is_empty()
            && self.delete_attachment_ids.is_empty()
            && self.reorder.is_empty()
        {
            return Err(Error::Validation("change-set is empty".into()));
        }

        let mut client_ids = HashSet::new();
        for staged in self
            .add_attachments
            .iter()
            .chain(self.replace_main.iter())
        {
            if staged.temp_key.is_empty() {
                return Err(Error::Validation(format!(
                    "staged file '{}' has an empty temp key",
                    staged.original_name
                )));
            }
            if staged.client_id.is_empty() {
                return Err(Error::Validation(format!(
                    "staged file '{}' has an empty client id",
                    staged.original_name
                )));
            }
            if !client_ids.insert(staged.client_id.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate client id '{}' in change-set",
                    staged.client_id
                )));
            }
            // Unsupported mime types fail here, before any I/O.
            SupportedMime::parse(&staged.mime_type)?;
        }

        for entry in &self.reorder {
            if entry.client_id.is_none() && entry.attachment_id.is_none() {
                return Err(Error::Validation(
                    "reorder entry names neither client id nor attachment id".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(client_id: &str, mime: &str) -> StagedFileRef {
        StagedFileRef {
            temp_key: format!("tmp/{}", client_id),
            original_name: format!("{}.bin", client_id),
            mime_type: mime.to_string(),
            size: 10,
            client_id: client_id.to_string(),
        }
    }

    #[test]
    fn test_empty_change_set_rejected() {
        let err = ChangeSet::default().validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_metadata_only_change_set_is_valid() {
        let cs = ChangeSet {
            metadata: Some(MetadataPatch {
                title: Some("New title".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        cs.validate().unwrap();
        assert!(!cs.changes_content());
    }

    #[test]
    fn test_duplicate_client_ids_rejected() {
        let cs = ChangeSet {
            add_attachments: vec![staged("c1", "application/pdf"), staged("c1", "text/plain")],
            ..Default::default()
        };
        let err = cs.validate().unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("duplicate client id")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_main_and_attachment_share_client_id_namespace() {
        let cs = ChangeSet {
            replace_main: Some(staged("c1", "application/pdf")),
            add_attachments: vec![staged("c1", "application/pdf")],
            ..Default::default()
        };
        assert!(cs.validate().is_err());
    }

    #[test]
    fn test_unsupported_mime_rejected_before_io() {
        let cs = ChangeSet {
            replace_main: Some(staged("c1", "video/mp4")),
            ..Default::default()
        };
        assert!(matches!(cs.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_reorder_entry_needs_some_handle() {
        let cs = ChangeSet {
            reorder: vec![ReorderEntry {
                client_id: None,
                attachment_id: None,
                sort_order: 0,
            }],
            ..Default::default()
        };
        assert!(cs.validate().is_err());
    }

    #[test]
    fn test_changes_content() {
        let mut cs = ChangeSet {
            delete_attachment_ids: vec![Uuid::new_v4()],
            ..Default::default()
        };
        assert!(cs.changes_content());

        cs.delete_attachment_ids.clear();
        cs.reorder.push(ReorderEntry {
            client_id: None,
            attachment_id: Some(Uuid::new_v4()),
            sort_order: 0,
        });
        // Pure reorder is a metadata-shaped change as far as reindexing
        // is concerned: no file content moved.
        assert!(!cs.changes_content());
    }
}
