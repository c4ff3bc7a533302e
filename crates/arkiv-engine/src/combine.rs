//! PDF combination orchestrator.
//!
//! Given a main file and the document's attachments in final order,
//! ensures every input is PDF and merges them into one combined
//! artifact in the `combined` storage category.
//!
//! Failure policy: a failed main conversion or a failed merge is fatal
//! (the document must never point at a missing combined artifact); a
//! failed individual attachment conversion is logged and skipped.

use std::sync::Arc;
use std::time::Instant;

use arkiv_convert::{ConversionBackend, PdfInput};
use arkiv_core::{Attachment, Result, SupportedMime};
use arkiv_store::{BlobStore, StorageCategory};
use futures::future::join_all;
use tracing::{debug, warn};

/// The combined artifact produced by one combine call.
#[derive(Debug, Clone)]
pub struct CombinedPdf {
    pub blob_key: String,
    pub size: i64,
    pub original_name: String,
}

/// Orchestrates download → ensure-PDF → merge → upload.
pub struct PdfCombiner {
    blobs: Arc<dyn BlobStore>,
    converter: Arc<dyn ConversionBackend>,
}

impl PdfCombiner {
    pub fn new(blobs: Arc<dyn BlobStore>, converter: Arc<dyn ConversionBackend>) -> Self {
        Self { blobs, converter }
    }

    /// Build the combined PDF for a main file plus `attachments` in the
    /// order given (callers pass the final ascending sort order).
    pub async fn combine(
        &self,
        main_path: &str,
        main_mime: &str,
        main_name: &str,
        attachments: &[Attachment],
    ) -> Result<CombinedPdf> {
        let start = Instant::now();

        // Main document conversion is fatal on failure.
        let main_bytes = self.blobs.download(main_path).await?;
        let mime = SupportedMime::parse(main_mime)?;
        let main_pdf = self.converter.to_pdf(&main_bytes, mime).await?;

        // Attachment conversions are independent; issue them
        // concurrently and skip the ones that fail.
        let conversions = join_all(
            attachments
                .iter()
                .map(|att| self.convert_attachment(att)),
        )
        .await;

        // Zero-padded sequential prefixes keep the merge service's
        // lexicographic processing aligned with the desired order.
        let mut inputs = vec![PdfInput {
            name: format!("000-{}.pdf", file_stem(main_name)),
            data: main_pdf,
        }];
        for converted in conversions.into_iter().flatten() {
            let (name, data) = converted;
            inputs.push(PdfInput {
                name: format!("{:03}-{}.pdf", inputs.len(), file_stem(&name)),
                data,
            });
        }

        // Merge failure is fatal: better no new combined PDF than a
        // dangling reference.
        let merged = self.converter.merge_pdfs(&inputs).await?;

        let original_name = format!("{}.pdf", file_stem(main_name));
        let stored = self
            .blobs
            .upload(
                &merged,
                &original_name,
                "application/pdf",
                StorageCategory::Combined,
            )
            .await?;

        debug!(
            blob_key = %stored.key,
            size_bytes = stored.size,
            attachment_count = attachments.len(),
            merged_count = inputs.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "combiner: combined PDF built"
        );

        Ok(CombinedPdf {
            blob_key: stored.key,
            size: stored.size,
            original_name,
        })
    }

    /// Download and convert one attachment. `None` means skip: the
    /// combined PDF is built from the attachments that still convert.
    async fn convert_attachment(&self, att: &Attachment) -> Option<(String, Vec<u8>)> {
        let result: Result<Vec<u8>> = async {
            let bytes = self.blobs.download(&att.file_path).await?;
            let mime = SupportedMime::parse(&att.mime_type)?;
            self.converter.to_pdf(&bytes, mime).await
        }
        .await;

        match result {
            Ok(pdf) => Some((att.file_name.clone(), pdf)),
            Err(e) => {
                warn!(
                    attachment_id = %att.id,
                    file_name = %att.file_name,
                    error = %e,
                    "combiner: attachment conversion failed, skipping"
                );
                None
            }
        }
    }
}

/// File name without its last extension.
fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
