//! Relational change application for one commit attempt.
//!
//! Everything here runs inside the transaction owned by
//! [`crate::engine::ComposeEngine`]; blob side effects are recorded in
//! the attempt's [`CommitTracker`] so the engine can settle them once
//! the relational outcome is known.

use std::collections::HashMap;

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use arkiv_core::{
    hash_access_code, Actor, AuditAction, AuditEntry, ChangeSet, Error, ReorderEntry, Result,
    StagedFileRef,
};
use arkiv_db::{NewAttachment, NewConvertedDocument, NewDocument, PgAuditLog};
use arkiv_store::StorageCategory;

use crate::engine::ComposeEngine;
use crate::tracker::CommitTracker;

impl ComposeEngine {
    /// Apply a create change-set. Returns the new document id.
    pub(crate) async fn apply_create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        change_set: &ChangeSet,
        actor: Actor,
        tracker: &mut CommitTracker,
    ) -> Result<Uuid> {
        let main = change_set
            .replace_main
            .as_ref()
            .ok_or_else(|| Error::Validation("create requires a main file".into()))?;

        tracker.track_temp(&main.temp_key);
        let promoted = self
            .blobs()
            .promote(&main.temp_key, StorageCategory::Documents)
            .await?;
        tracker.track_promoted(&promoted.key);

        if let Some(existing) = self
            .documents()
            .find_id_by_hash_tx(tx, &promoted.hash)
            .await?
        {
            return Err(Error::Conflict(format!(
                "content already exists as document {}",
                existing
            )));
        }

        let patch = change_set.metadata.clone().unwrap_or_default();
        let is_confidential = patch.is_confidential.unwrap_or(false);
        let doc = self
            .documents()
            .insert_tx(
                tx,
                NewDocument {
                    author_id: actor.user_id,
                    title: patch
                        .title
                        .clone()
                        .unwrap_or_else(|| main.original_name.clone()),
                    description: patch.description.clone(),
                    keywords: patch.keywords.clone().unwrap_or_default(),
                    file_path: promoted.key.clone(),
                    file_name: main.original_name.clone(),
                    file_size: promoted.size,
                    mime_type: main.mime_type.clone(),
                    content_hash: promoted.hash.clone(),
                    is_confidential,
                    is_secret: patch.is_secret.unwrap_or(false),
                    access_code_hash: patch.access_code.as_deref().map(hash_access_code),
                },
            )
            .await?;

        if let Some(category_ids) = &patch.category_ids {
            self.documents()
                .replace_categories_tx(tx, doc.id, category_ids)
                .await?;
        }
        if is_confidential {
            if let Some(user_ids) = &patch.confidential_user_ids {
                self.documents()
                    .replace_confidential_access_tx(tx, doc.id, user_ids)
                    .await?;
            }
        }

        let client_map = self
            .create_attachments(tx, doc.id, &change_set.add_attachments, tracker)
            .await?;
        self.apply_reorder(tx, doc.id, &change_set.reorder, &client_map)
            .await?;

        self.rebuild_combined_pdf(tx, doc.id, &doc.file_path, &doc.mime_type, &doc.file_name, tracker)
            .await?;

        PgAuditLog::log_tx(
            tx,
            &AuditEntry {
                document_id: doc.id,
                actor_id: actor.user_id,
                action: AuditAction::Create,
                changed_fields: changed_fields(change_set),
            },
        )
        .await?;

        Ok(doc.id)
    }

    /// Apply an update change-set to an existing document.
    pub(crate) async fn apply_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        change_set: &ChangeSet,
        actor: Actor,
        tracker: &mut CommitTracker,
    ) -> Result<Uuid> {
        let mut doc = self.documents().get_tx(tx, document_id).await?;

        // Authorization runs before any promotion touches storage.
        if !actor.may_edit(&doc) {
            return Err(Error::Forbidden(format!(
                "user {} may not edit document {}",
                actor.user_id, document_id
            )));
        }

        if let Some(patch) = &change_set.metadata {
            if let Some(title) = &patch.title {
                doc.title = title.clone();
            }
            if let Some(description) = &patch.description {
                doc.description = Some(description.clone());
            }
            if let Some(keywords) = &patch.keywords {
                doc.keywords = keywords.clone();
            }
            if let Some(category_ids) = &patch.category_ids {
                self.documents()
                    .replace_categories_tx(tx, doc.id, category_ids)
                    .await?;
            }
            if let Some(is_secret) = patch.is_secret {
                doc.is_secret = is_secret;
            }
            if let Some(access_code) = &patch.access_code {
                doc.access_code_hash = Some(hash_access_code(access_code));
            }
            match patch.is_confidential {
                Some(false) => {
                    // Turning confidentiality off clears the whole
                    // access apparatus, not just the flag.
                    doc.is_confidential = false;
                    doc.access_code_hash = None;
                    self.documents()
                        .clear_confidential_access_tx(tx, doc.id)
                        .await?;
                }
                Some(true) => doc.is_confidential = true,
                None => {}
            }
            if doc.is_confidential {
                if let Some(user_ids) = &patch.confidential_user_ids {
                    self.documents()
                        .replace_confidential_access_tx(tx, doc.id, user_ids)
                        .await?;
                }
            }
        }

        if let Some(main) = &change_set.replace_main {
            tracker.track_temp(&main.temp_key);
            let promoted = self
                .blobs()
                .promote(&main.temp_key, StorageCategory::Documents)
                .await?;
            tracker.track_promoted(&promoted.key);

            // The old main blob stays readable until the replacement
            // is durably committed.
            tracker.track_cleanup_on_success(&doc.file_path);
            doc.file_path = promoted.key;
            doc.file_name = main.original_name.clone();
            doc.file_size = promoted.size;
            doc.mime_type = main.mime_type.clone();
            doc.content_hash = promoted.hash;
        }

        let client_map = self
            .create_attachments(tx, doc.id, &change_set.add_attachments, tracker)
            .await?;

        for attachment_id in &change_set.delete_attachment_ids {
            let att = self.attachments().get_tx(tx, *attachment_id).await?;
            if att.document_id != doc.id {
                return Err(Error::AttachmentNotFound(*attachment_id));
            }
            tracker.track_cleanup_on_success(&att.file_path);
            self.attachments().delete_tx(tx, *attachment_id).await?;
        }

        self.apply_reorder(tx, doc.id, &change_set.reorder, &client_map)
            .await?;

        // Persist the metadata/file changes before the combine pass so
        // the rebuild sees the final state of the row.
        self.documents().update_tx(tx, &doc).await?;

        // Always rebuild: the attachment set may have shifted even on a
        // change-set that looks metadata-only.
        self.rebuild_combined_pdf(tx, doc.id, &doc.file_path, &doc.mime_type, &doc.file_name, tracker)
            .await?;

        PgAuditLog::log_tx(
            tx,
            &AuditEntry {
                document_id: doc.id,
                actor_id: actor.user_id,
                action: AuditAction::Update,
                changed_fields: changed_fields(change_set),
            },
        )
        .await?;

        Ok(doc.id)
    }

    /// Promote and insert new attachments, building the
    /// `client_id → attachment_id` map reorder entries resolve through.
    async fn create_attachments(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        staged: &[StagedFileRef],
        tracker: &mut CommitTracker,
    ) -> Result<HashMap<String, Uuid>> {
        let mut client_map = HashMap::with_capacity(staged.len());
        for file in staged {
            tracker.track_temp(&file.temp_key);
            let promoted = self
                .blobs()
                .promote(&file.temp_key, StorageCategory::Attachments)
                .await?;
            tracker.track_promoted(&promoted.key);

            let attachment = self
                .attachments()
                .insert_tx(
                    tx,
                    NewAttachment {
                        document_id,
                        file_path: promoted.key,
                        file_name: file.original_name.clone(),
                        mime_type: file.mime_type.clone(),
                    },
                )
                .await?;
            client_map.insert(file.client_id.clone(), attachment.id);
        }
        Ok(client_map)
    }

    /// Resolve and validate every reorder entry, then apply them all.
    ///
    /// Validation of the full list happens before the first write so a
    /// stale reference aborts the transaction without a partial
    /// reorder.
    async fn apply_reorder(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        entries: &[ReorderEntry],
        client_map: &HashMap<String, Uuid>,
    ) -> Result<()> {
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            let attachment_id = if let Some(id) = entry.attachment_id {
                let att = self.attachments().get_tx(tx, id).await?;
                if att.document_id != document_id {
                    return Err(Error::AttachmentNotFound(id));
                }
                id
            } else if let Some(client_id) = &entry.client_id {
                *client_map.get(client_id.as_str()).ok_or_else(|| {
                    Error::Validation(format!(
                        "reorder references unknown client id '{}'",
                        client_id
                    ))
                })?
            } else {
                return Err(Error::Validation(
                    "reorder entry names neither client id nor attachment id".into(),
                ));
            };
            resolved.push((attachment_id, entry.sort_order));
        }

        for (attachment_id, sort_order) in resolved {
            self.attachments()
                .set_order_tx(tx, attachment_id, sort_order)
                .await?;
        }
        Ok(())
    }

    /// Combine main + attachments into a fresh combined PDF, link it,
    /// and supersede any previous converted record.
    async fn rebuild_combined_pdf(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        main_path: &str,
        main_mime: &str,
        main_name: &str,
        tracker: &mut CommitTracker,
    ) -> Result<()> {
        let old_converted = self.converted().find_by_document_tx(tx, document_id).await?;

        let attachments = self
            .attachments()
            .list_by_document_tx(tx, document_id)
            .await?;
        let combined = self
            .combiner()
            .combine(main_path, main_mime, main_name, &attachments)
            .await?;
        tracker.track_promoted(&combined.blob_key);

        let converted = self
            .converted()
            .insert_tx(
                tx,
                NewConvertedDocument {
                    document_id,
                    file_path: combined.blob_key.clone(),
                    file_size: combined.size,
                    original_file: combined.original_name,
                },
            )
            .await?;
        self.documents()
            .set_main_pdf_tx(tx, document_id, Some(converted.id))
            .await?;

        // Superseded combined PDFs: rows go now (same transaction),
        // blobs only after commit.
        for old in old_converted {
            tracker.track_cleanup_on_success(&old.file_path);
            self.converted().delete_tx(tx, old.id).await?;
        }
        Ok(())
    }
}

/// Field names a change-set touches, for the audit entry.
pub(crate) fn changed_fields(change_set: &ChangeSet) -> Vec<String> {
    let mut fields = Vec::new();
    if let Some(patch) = &change_set.metadata {
        if patch.title.is_some() {
            fields.push("title".to_string());
        }
        if patch.description.is_some() {
            fields.push("description".to_string());
        }
        if patch.category_ids.is_some() {
            fields.push("categories".to_string());
        }
        if patch.keywords.is_some() {
            fields.push("keywords".to_string());
        }
        if patch.is_confidential.is_some() {
            fields.push("is_confidential".to_string());
        }
        if patch.is_secret.is_some() {
            fields.push("is_secret".to_string());
        }
        if patch.access_code.is_some() {
            fields.push("access_code".to_string());
        }
        if patch.confidential_user_ids.is_some() {
            fields.push("confidential_access".to_string());
        }
    }
    if change_set.replace_main.is_some() {
        fields.push("main_file".to_string());
    }
    if !change_set.add_attachments.is_empty() || !change_set.delete_attachment_ids.is_empty() {
        fields.push("attachments".to_string());
    }
    if !change_set.reorder.is_empty() {
        fields.push("attachment_order".to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkiv_core::MetadataPatch;

    #[test]
    fn test_changed_fields_title_only() {
        let cs = ChangeSet {
            metadata: Some(MetadataPatch {
                title: Some("New".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(changed_fields(&cs), vec!["title"]);
    }

    #[test]
    fn test_changed_fields_files_and_order() {
        let cs = ChangeSet {
            delete_attachment_ids: vec![Uuid::new_v4()],
            reorder: vec![ReorderEntry {
                client_id: None,
                attachment_id: Some(Uuid::new_v4()),
                sort_order: 2,
            }],
            ..Default::default()
        };
        assert_eq!(changed_fields(&cs), vec!["attachments", "attachment_order"]);
    }

    #[test]
    fn test_changed_fields_empty_for_empty_set() {
        assert!(changed_fields(&ChangeSet::default()).is_empty());
    }
}
