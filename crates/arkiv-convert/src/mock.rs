//! Mock conversion backend for deterministic testing.
//!
//! Produces recognizable output framing so tests can assert what got
//! converted and merged, and supports scripted failures for exercising
//! the orchestrator's skip-vs-fatal branches.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let backend = MockConversionBackend::new()
//!     .fail_when_contains(b"poison");
//!
//! let pdf = backend.to_pdf(b"doc", SupportedMime::Docx).await?;
//! assert_eq!(pdf, b"[pdf]doc");
//! ```

use arkiv_core::{Error, Result, SupportedMime};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::adapter::{ConversionBackend, PdfInput};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ToPdf { mime: SupportedMime, size: usize },
    Merge { names: Vec<String> },
}

/// Mock conversion backend.
#[derive(Clone, Default)]
pub struct MockConversionBackend {
    fail_patterns: Vec<Vec<u8>>,
    fail_merge: bool,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockConversionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any `to_pdf` whose input contains the given byte pattern.
    pub fn fail_when_contains(mut self, pattern: &[u8]) -> Self {
        self.fail_patterns.push(pattern.to_vec());
        self
    }

    /// Fail every merge call.
    pub fn fail_merge(mut self) -> Self {
        self.fail_merge = true;
        self
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of merge calls issued.
    pub fn merge_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Merge { .. }))
            .count()
    }

    fn contains_pattern(&self, data: &[u8]) -> bool {
        self.fail_patterns
            .iter()
            .any(|p| data.windows(p.len()).any(|w| w == p.as_slice()))
    }
}

#[async_trait]
impl ConversionBackend for MockConversionBackend {
    async fn to_pdf(&self, data: &[u8], mime: SupportedMime) -> Result<Vec<u8>> {
        self.call_log.lock().unwrap().push(MockCall::ToPdf {
            mime,
            size: data.len(),
        });

        if self.contains_pattern(data) {
            return Err(Error::ExternalService("scripted conversion failure".into()));
        }
        if mime.is_pdf() {
            return Ok(data.to_vec());
        }

        let mut out = b"[pdf]".to_vec();
        out.extend_from_slice(data);
        Ok(out)
    }

    async fn merge_pdfs(&self, inputs: &[PdfInput]) -> Result<Vec<u8>> {
        self.call_log.lock().unwrap().push(MockCall::Merge {
            names: inputs.iter().map(|i| i.name.clone()).collect(),
        });

        match inputs {
            [] => Err(Error::Internal("merge_pdfs called with no inputs".into())),
            [single] => Ok(single.data.clone()),
            many => {
                if self.fail_merge {
                    return Err(Error::ExternalService("scripted merge failure".into()));
                }
                let mut out = b"[merged]".to_vec();
                for input in many {
                    out.extend_from_slice(input.name.as_bytes());
                    out.push(b'|');
                    out.extend_from_slice(&input.data);
                    out.push(b';');
                }
                Ok(out)
            }
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
