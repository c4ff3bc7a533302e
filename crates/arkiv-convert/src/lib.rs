//! # arkiv-convert
//!
//! External PDF conversion and merge adapter for arkiv.
//!
//! This crate provides:
//! - The [`ConversionBackend`] trait (convert-to-PDF, merge-PDFs)
//! - [`HttpConversionBackend`] for Gotenberg-compatible services
//! - [`MockConversionBackend`] for deterministic tests

pub mod adapter;
pub mod mock;

// Re-export core types
pub use arkiv_core::{Error, Result};

pub use adapter::{ConversionBackend, HttpConversionBackend, PdfInput};
pub use mock::{MockCall, MockConversionBackend};
