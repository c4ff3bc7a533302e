//! End-to-end composition commits against a live PostgreSQL database.
//!
//! These tests exercise the full create/update/retire paths with an
//! in-memory blob store and a mock conversion backend, asserting the
//! engine's atomicity and no-dangling-reference guarantees.
//!
//! Run with `cargo test -- --ignored` against a disposable database
//! (`DATABASE_URL`, see arkiv-db's test fixtures).

use std::sync::Arc;

use uuid::Uuid;

use arkiv_convert::MockConversionBackend;
use arkiv_core::{
    Actor, ChangeSet, Error, MetadataPatch, ReorderEntry, Role, StagedFileRef,
};
use arkiv_db::test_fixtures::TestDatabase;
use arkiv_db::{PgAttachmentRepository, PgDocumentRepository, PgJobQueue};
use arkiv_engine::ComposeEngine;
use arkiv_store::{BlobStore, MemoryBackend, StagingStore};

struct Harness {
    db: TestDatabase,
    backend: Arc<MemoryBackend>,
    store: Arc<StagingStore>,
    engine: ComposeEngine,
    author: Actor,
}

impl Harness {
    async fn with_mock(mock: MockConversionBackend) -> Self {
        dotenvy::dotenv().ok();
        let db = TestDatabase::new().await;
        db.cleanup().await;

        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(StagingStore::new(backend.clone()));
        let engine = ComposeEngine::new(
            db.pool.clone(),
            store.clone(),
            Arc::new(mock),
            Arc::new(PgJobQueue::new(db.pool.clone())),
        );
        Self {
            db,
            backend,
            store,
            engine,
            author: Actor {
                user_id: Uuid::new_v4(),
                role: Role::Reader,
            },
        }
    }

    async fn new() -> Self {
        Self::with_mock(MockConversionBackend::new()).await
    }

    /// Stage bytes and wrap the handle as a change-set file ref.
    async fn stage(&self, data: &[u8], name: &str, mime: &str, client_id: &str) -> StagedFileRef {
        let staged = self.store.stage(data, name, mime).await.unwrap();
        StagedFileRef {
            temp_key: staged.temp_key,
            original_name: staged.original_name,
            mime_type: mime.to_string(),
            size: staged.size,
            client_id: client_id.to_string(),
        }
    }

    fn documents(&self) -> PgDocumentRepository {
        PgDocumentRepository::new(self.db.pool.clone())
    }

    fn attachments(&self) -> PgAttachmentRepository {
        PgAttachmentRepository::new(self.db.pool.clone())
    }

    async fn jobs_for(&self, document_id: Uuid) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT job_kind FROM job_queue WHERE document_id = $1 ORDER BY created_at, id",
        )
        .bind(document_id)
        .fetch_all(&self.db.pool)
        .await
        .unwrap()
    }

    async fn last_audit(&self, document_id: Uuid) -> (String, Vec<String>) {
        let row: (String, serde_json::Value) = sqlx::query_as(
            r#"SELECT action, changed_fields FROM audit_log
               WHERE document_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1"#,
        )
        .bind(document_id)
        .fetch_one(&self.db.pool)
        .await
        .unwrap();
        let fields = serde_json::from_value(row.1).unwrap();
        (row.0, fields)
    }

    async fn allow_list(&self, document_id: Uuid) -> Vec<Uuid> {
        sqlx::query_scalar("SELECT user_id FROM confidential_access WHERE document_id = $1")
            .bind(document_id)
            .fetch_all(&self.db.pool)
            .await
            .unwrap()
    }

    async fn document_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM document")
            .fetch_one(&self.db.pool)
            .await
            .unwrap()
    }

    /// Basic create: docx main + one pdf attachment ordered first.
    async fn create_fixture_document(&self) -> Uuid {
        let change_set = ChangeSet {
            operation_id: Some("op-create".into()),
            replace_main: Some(
                self.stage(
                    b"main content",
                    "report.docx",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                    "main",
                )
                .await,
            ),
            add_attachments: vec![
                self.stage(b"%PDF annex", "annex.pdf", "application/pdf", "c1")
                    .await,
            ],
            reorder: vec![ReorderEntry {
                client_id: Some("c1".into()),
                attachment_id: None,
                sort_order: 0,
            }],
            ..Default::default()
        };
        self.engine
            .compose_create(change_set, self.author)
            .await
            .unwrap()
            .document_id
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_create_full_scenario() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;

    // One document row with resolvable blobs all the way down.
    let doc = h.documents().get(doc_id).await.unwrap();
    assert_eq!(doc.file_name, "report.docx");
    assert!(h.store.exists(&doc.file_path).await.unwrap());

    let attachments = h.attachments().list_by_document(doc_id).await.unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].sort_order, 0);
    assert!(h.store.exists(&attachments[0].file_path).await.unwrap());

    // The combined PDF exists and is linked.
    let converted_path: String = sqlx::query_scalar(
        "SELECT file_path FROM converted_document WHERE id = $1",
    )
    .bind(doc.main_pdf_id.expect("combined PDF linked"))
    .fetch_one(&h.db.pool)
    .await
    .unwrap();
    assert!(h.store.exists(&converted_path).await.unwrap());
    // Merge of converted main + attachment, not a passthrough.
    let combined = h.store.download(&converted_path).await.unwrap();
    assert!(combined.starts_with(b"[merged]"));

    // Temp blobs are gone after a successful commit.
    assert!(h.backend.keys().iter().all(|k| !k.starts_with("tmp/")));

    assert_eq!(h.jobs_for(doc_id).await, vec!["update-content-and-reindex"]);
    let (action, fields) = h.last_audit(doc_id).await;
    assert_eq!(action, "document.create");
    assert!(fields.contains(&"main_file".to_string()));

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_metadata_only_update_is_lightweight() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;
    let before = h.documents().get(doc_id).await.unwrap();
    let mut promoted_before: Vec<String> = h
        .backend
        .keys()
        .into_iter()
        .filter(|k| k.starts_with("documents/") || k.starts_with("attachments/"))
        .collect();
    promoted_before.sort();

    let change_set = ChangeSet {
        metadata: Some(MetadataPatch {
            title: Some("Retitled".into()),
            ..Default::default()
        }),
        ..Default::default()
    };
    h.engine
        .compose_update(doc_id, change_set, h.author)
        .await
        .unwrap();

    let after = h.documents().get(doc_id).await.unwrap();
    assert_eq!(after.title, "Retitled");
    // No promotion happened; the main file reference is untouched.
    assert_eq!(after.file_path, before.file_path);
    let mut promoted_after: Vec<String> = h
        .backend
        .keys()
        .into_iter()
        .filter(|k| k.starts_with("documents/") || k.starts_with("attachments/"))
        .collect();
    promoted_after.sort();
    assert_eq!(promoted_before, promoted_after);

    // Lightweight reindex, audit entry listing exactly the title.
    assert_eq!(
        h.jobs_for(doc_id).await,
        vec!["update-content-and-reindex", "index-document"]
    );
    let (action, fields) = h.last_audit(doc_id).await;
    assert_eq!(action, "document.update");
    assert_eq!(fields, vec!["title"]);

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_disabling_confidentiality_clears_access_apparatus() {
    let h = Harness::new().await;
    let reader = Uuid::new_v4();

    let change_set = ChangeSet {
        metadata: Some(MetadataPatch {
            is_confidential: Some(true),
            access_code: Some("0420".into()),
            confidential_user_ids: Some(vec![reader]),
            ..Default::default()
        }),
        replace_main: Some(h.stage(b"secret main", "s.txt", "text/plain", "main").await),
        ..Default::default()
    };
    let doc_id = h
        .engine
        .compose_create(change_set, h.author)
        .await
        .unwrap()
        .document_id;

    let doc = h.documents().get(doc_id).await.unwrap();
    assert!(doc.is_confidential);
    assert!(doc.access_code_hash.is_some());
    assert_eq!(h.allow_list(doc_id).await, vec![reader]);

    // Turning the flag off retires the whole access apparatus, not
    // just the flag itself.
    let change_set = ChangeSet {
        metadata: Some(MetadataPatch {
            is_confidential: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    };
    h.engine
        .compose_update(doc_id, change_set, h.author)
        .await
        .unwrap();

    let doc = h.documents().get(doc_id).await.unwrap();
    assert!(!doc.is_confidential);
    assert!(doc.access_code_hash.is_none());
    assert!(h.allow_list(doc_id).await.is_empty());

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_update_rebuild_supersedes_combined_pdf() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;
    let old_pdf = h.documents().get(doc_id).await.unwrap().main_pdf_id.unwrap();
    let old_path: String =
        sqlx::query_scalar("SELECT file_path FROM converted_document WHERE id = $1")
            .bind(old_pdf)
            .fetch_one(&h.db.pool)
            .await
            .unwrap();

    let change_set = ChangeSet {
        metadata: Some(MetadataPatch {
            title: Some("v2".into()),
            ..Default::default()
        }),
        ..Default::default()
    };
    h.engine
        .compose_update(doc_id, change_set, h.author)
        .await
        .unwrap();

    let new_pdf = h.documents().get(doc_id).await.unwrap().main_pdf_id.unwrap();
    assert_ne!(new_pdf, old_pdf);
    // Old combined blob deleted only after the new one was committed.
    assert!(!h.store.exists(&old_path).await.unwrap());

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_failed_merge_aborts_create_and_compensates() {
    let h = Harness::with_mock(MockConversionBackend::new().fail_merge()).await;

    let change_set = ChangeSet {
        replace_main: Some(
            h.stage(b"main bytes", "m.txt", "text/plain", "main").await,
        ),
        add_attachments: vec![h.stage(b"att bytes", "a.txt", "text/plain", "c1").await],
        ..Default::default()
    };
    let err = h
        .engine
        .compose_create(change_set, h.author)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExternalService(_)));

    // Nothing committed and every promoted blob compensated: no
    // permanent key survives the failed attempt.
    assert_eq!(h.document_count().await, 0);
    assert!(h.backend.keys().iter().all(|k| k.starts_with("tmp/")));

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_content_hash_conflicts() {
    let h = Harness::new().await;
    h.create_fixture_document().await;

    let change_set = ChangeSet {
        replace_main: Some(
            h.stage(
                b"main content",
                "copy.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "main",
            )
            .await,
        ),
        ..Default::default()
    };
    let err = h
        .engine
        .compose_create(change_set, h.author)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(h.document_count().await, 1);

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_stale_delete_attachment_id_aborts_update() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;
    let foreign_doc = h.create_fixture_document_with_content(b"other content").await;
    let foreign_att = h.attachments().list_by_document(foreign_doc).await.unwrap()[0].id;

    // Deleting an attachment of another document must abort whole.
    let change_set = ChangeSet {
        delete_attachment_ids: vec![foreign_att],
        ..Default::default()
    };
    let err = h
        .engine
        .compose_update(doc_id, change_set, h.author)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AttachmentNotFound(_)));

    // No attachment anywhere was deleted.
    assert_eq!(h.attachments().list_by_document(doc_id).await.unwrap().len(), 1);
    assert_eq!(
        h.attachments().list_by_document(foreign_doc).await.unwrap().len(),
        1
    );

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_reorder_reference_aborts_commit() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;

    let change_set = ChangeSet {
        add_attachments: vec![h.stage(b"%PDF new", "new.pdf", "application/pdf", "c9").await],
        reorder: vec![ReorderEntry {
            client_id: Some("never-created".into()),
            attachment_id: None,
            sort_order: 1,
        }],
        ..Default::default()
    };
    let err = h
        .engine
        .compose_update(doc_id, change_set, h.author)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // The whole transaction rolled back: the new attachment row is
    // gone and its promoted blob was compensated.
    assert_eq!(h.attachments().list_by_document(doc_id).await.unwrap().len(), 1);

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_reorder_is_idempotent() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;
    let extra = ChangeSet {
        add_attachments: vec![
            h.stage(b"%PDF b", "b.pdf", "application/pdf", "cb").await,
            h.stage(b"%PDF c", "c.pdf", "application/pdf", "cc").await,
        ],
        reorder: vec![
            ReorderEntry {
                client_id: Some("cb".into()),
                attachment_id: None,
                sort_order: 5,
            },
            ReorderEntry {
                client_id: Some("cc".into()),
                attachment_id: None,
                sort_order: 2,
            },
        ],
        ..Default::default()
    };
    h.engine
        .compose_update(doc_id, extra, h.author)
        .await
        .unwrap();

    let order1: Vec<Uuid> = h
        .attachments()
        .list_by_document(doc_id)
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();

    // Re-apply the same ordering by persisted id.
    let reorder = ChangeSet {
        reorder: order1
            .iter()
            .enumerate()
            .map(|(i, id)| ReorderEntry {
                client_id: None,
                attachment_id: Some(*id),
                sort_order: i as i32,
            })
            .collect(),
        ..Default::default()
    };
    h.engine
        .compose_update(doc_id, reorder.clone(), h.author)
        .await
        .unwrap();
    let order2: Vec<Uuid> = h
        .attachments()
        .list_by_document(doc_id)
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    h.engine
        .compose_update(doc_id, reorder, h.author)
        .await
        .unwrap();
    let order3: Vec<Uuid> = h
        .attachments()
        .list_by_document(doc_id)
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();

    assert_eq!(order1, order2);
    assert_eq!(order2, order3);

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_foreign_reader_cannot_update() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;

    let stranger = Actor {
        user_id: Uuid::new_v4(),
        role: Role::Reader,
    };
    let staged = h.stage(b"new main", "n.txt", "text/plain", "main").await;
    let temp_key = staged.temp_key.clone();
    let change_set = ChangeSet {
        replace_main: Some(staged),
        ..Default::default()
    };
    let err = h
        .engine
        .compose_update(doc_id, change_set, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    // Rejected before promotion: the staged blob is still in place.
    assert!(h.store.exists(&temp_key).await.unwrap());

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_replace_main_supersedes_old_blob_post_commit() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;
    let old_path = h.documents().get(doc_id).await.unwrap().file_path;

    let change_set = ChangeSet {
        replace_main: Some(h.stage(b"fresh main", "v2.txt", "text/plain", "main").await),
        ..Default::default()
    };
    h.engine
        .compose_update(doc_id, change_set, h.author)
        .await
        .unwrap();

    let doc = h.documents().get(doc_id).await.unwrap();
    assert_ne!(doc.file_path, old_path);
    assert!(h.store.exists(&doc.file_path).await.unwrap());
    assert!(!h.store.exists(&old_path).await.unwrap());

    h.db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_delete_retires_rows_blobs_and_index() {
    let h = Harness::new().await;
    let doc_id = h.create_fixture_document().await;

    h.engine.compose_delete(doc_id, h.author).await.unwrap();

    assert_eq!(h.document_count().await, 0);
    // Every permanent blob of the document is gone.
    assert!(h.backend.keys().iter().all(|k| k.starts_with("tmp/")));
    assert!(h.jobs_for(doc_id).await.contains(&"remove-from-index".to_string()));
    let (action, _) = h.last_audit(doc_id).await;
    assert_eq!(action, "document.delete");

    h.db.cleanup().await;
}

impl Harness {
    /// Variant of the fixture with different main content, for
    /// hash-conflict-free second documents.
    async fn create_fixture_document_with_content(&self, content: &[u8]) -> Uuid {
        let change_set = ChangeSet {
            replace_main: Some(self.stage(content, "other.txt", "text/plain", "main").await),
            add_attachments: vec![
                self.stage(b"%PDF other-annex", "oa.pdf", "application/pdf", "c1")
                    .await,
            ],
            ..Default::default()
        };
        self.engine
            .compose_create(change_set, self.author)
            .await
            .unwrap()
            .document_id
    }
}
