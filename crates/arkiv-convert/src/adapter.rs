//! Conversion backend trait and the HTTP implementation.
//!
//! The HTTP backend talks to a Gotenberg-compatible conversion service:
//! office/image/text conversions go through the LibreOffice route, HTML
//! through the Chromium route, and merges through the pdfengines route.
//! The merge endpoint processes parts in lexicographic file-name order,
//! which is why callers prefix names with zero-padded sequence numbers.

use arkiv_core::{defaults, Error, Result, SupportedMime};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One named PDF handed to a merge call.
#[derive(Debug, Clone)]
pub struct PdfInput {
    pub name: String,
    pub data: Vec<u8>,
}

/// Backend for converting documents to PDF and merging PDFs.
///
/// Failures are not retried here; the composition engine decides
/// whether the whole commit aborts.
#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// Convert a document to PDF. Passthrough if it already is one.
    async fn to_pdf(&self, data: &[u8], mime: SupportedMime) -> Result<Vec<u8>>;

    /// Merge PDFs into one, in the order given. A single input is
    /// returned unchanged without a service call.
    async fn merge_pdfs(&self, inputs: &[PdfInput]) -> Result<Vec<u8>>;

    /// Check if the conversion service is reachable.
    async fn health_check(&self) -> Result<bool>;
}

/// Gotenberg-compatible HTTP conversion backend with a bounded request
/// timeout. A timeout propagates as [`Error::ExternalService`] and is
/// fatal to the commit in progress.
pub struct HttpConversionBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpConversionBackend {
    pub fn new(base_url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("conversion client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CONVERT_BASE_URL` | — (required) | Conversion service base URL |
    /// | `CONVERT_TIMEOUT_SECS` | `120` | Request timeout |
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(defaults::ENV_CONVERT_BASE_URL)
            .map_err(|_| Error::Config(format!("{} is not set", defaults::ENV_CONVERT_BASE_URL)))?;
        let timeout_secs = std::env::var(defaults::ENV_CONVERT_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::DEFAULT_CONVERT_TIMEOUT_SECS);
        Self::new(base_url, timeout_secs)
    }

    /// Conversion route for a mime type. HTML renders via Chromium,
    /// everything else via LibreOffice.
    fn convert_route(mime: SupportedMime) -> &'static str {
        match mime {
            SupportedMime::Html => "/forms/chromium/convert/html",
            _ => "/forms/libreoffice/convert",
        }
    }

    /// File name the service expects for a conversion upload. The
    /// Chromium route requires the entry file to be `index.html`.
    fn upload_name(mime: SupportedMime) -> String {
        match mime {
            SupportedMime::Html => "index.html".to_string(),
            _ => format!("document.{}", mime.extension()),
        }
    }

    async fn post_form(
        &self,
        route: &str,
        form: reqwest::multipart::Form,
        op: &'static str,
    ) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, route);
        let start = Instant::now();

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(op, %status, error = %body, "conversion service returned failure");
            return Err(Error::ExternalService(format!(
                "{} failed: {} {}",
                op,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = response.bytes().await?.to_vec();
        debug!(
            op,
            duration_ms = start.elapsed().as_millis() as u64,
            size_bytes = bytes.len(),
            "conversion service call complete"
        );
        Ok(bytes)
    }
}

#[async_trait]
impl ConversionBackend for HttpConversionBackend {
    async fn to_pdf(&self, data: &[u8], mime: SupportedMime) -> Result<Vec<u8>> {
        if mime.is_pdf() {
            return Ok(data.to_vec());
        }

        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(Self::upload_name(mime))
            .mime_str(mime.as_str())
            .map_err(|e| Error::Internal(format!("multipart part: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("files", part);

        self.post_form(Self::convert_route(mime), form, "to_pdf")
            .await
    }

    async fn merge_pdfs(&self, inputs: &[PdfInput]) -> Result<Vec<u8>> {
        match inputs {
            [] => Err(Error::Internal("merge_pdfs called with no inputs".into())),
            [single] => Ok(single.data.clone()),
            _ => {
                let mut form = reqwest::multipart::Form::new();
                for input in inputs {
                    let part = reqwest::multipart::Part::bytes(input.data.clone())
                        .file_name(input.name.clone())
                        .mime_str("application/pdf")
                        .map_err(|e| Error::Internal(format!("multipart part: {}", e)))?;
                    form = form.part("files", part);
                }
                self.post_form("/forms/pdfengines/merge", form, "merge_pdfs")
                    .await
            }
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) => {
                debug!(error = %e, "conversion service health check failed");
                Ok(false)
            }
        }
    }
}
