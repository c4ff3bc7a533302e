//! Closed capability table of mime types the composition engine accepts.
//!
//! Conversion behavior is keyed by this enum rather than by raw mime
//! strings so that an unsupported type fails fast, before any blob or
//! network I/O has happened.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Mime types the conversion pipeline knows how to turn into PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportedMime {
    Pdf,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Ppt,
    Pptx,
    Odt,
    Ods,
    Odp,
    Rtf,
    Txt,
    Html,
    Png,
    Jpeg,
}

impl SupportedMime {
    /// Look up a raw mime string. Unknown types are rejected here,
    /// before any side effect.
    pub fn parse(mime: &str) -> Result<Self> {
        // Strip parameters like "; charset=utf-8".
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence {
            "application/pdf" => Ok(Self::Pdf),
            "application/msword" => Ok(Self::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(Self::Docx)
            }
            "application/vnd.ms-excel" => Ok(Self::Xls),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Ok(Self::Xlsx),
            "application/vnd.ms-powerpoint" => Ok(Self::Ppt),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                Ok(Self::Pptx)
            }
            "application/vnd.oasis.opendocument.text" => Ok(Self::Odt),
            "application/vnd.oasis.opendocument.spreadsheet" => Ok(Self::Ods),
            "application/vnd.oasis.opendocument.presentation" => Ok(Self::Odp),
            "application/rtf" | "text/rtf" => Ok(Self::Rtf),
            "text/plain" => Ok(Self::Txt),
            "text/html" => Ok(Self::Html),
            "image/png" => Ok(Self::Png),
            "image/jpeg" => Ok(Self::Jpeg),
            other => Err(Error::Validation(format!(
                "unsupported mime type: {}",
                other
            ))),
        }
    }

    /// Whether the type is already PDF (conversion is a passthrough).
    pub fn is_pdf(self) -> bool {
        matches!(self, Self::Pdf)
    }

    /// Canonical mime string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Doc => "application/msword",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Xls => "application/vnd.ms-excel",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Ppt => "application/vnd.ms-powerpoint",
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Odt => "application/vnd.oasis.opendocument.text",
            Self::Ods => "application/vnd.oasis.opendocument.spreadsheet",
            Self::Odp => "application/vnd.oasis.opendocument.presentation",
            Self::Rtf => "application/rtf",
            Self::Txt => "text/plain",
            Self::Html => "text/html",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// File extension used when a conversion upload needs a file name.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Odt => "odt",
            Self::Ods => "ods",
            Self::Odp => "odp",
            Self::Rtf => "rtf",
            Self::Txt => "txt",
            Self::Html => "html",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pdf() {
        assert_eq!(SupportedMime::parse("application/pdf").unwrap(), SupportedMime::Pdf);
        assert!(SupportedMime::parse("application/pdf").unwrap().is_pdf());
    }

    #[test]
    fn test_parse_strips_parameters() {
        let mime = SupportedMime::parse("text/html; charset=utf-8").unwrap();
        assert_eq!(mime, SupportedMime::Html);
    }

    #[test]
    fn test_parse_office_types() {
        assert_eq!(
            SupportedMime::parse(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            )
            .unwrap(),
            SupportedMime::Docx
        );
        assert!(!SupportedMime::parse("application/msword").unwrap().is_pdf());
    }

    #[test]
    fn test_parse_unsupported_fails() {
        let err = SupportedMime::parse("video/mp4").unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("video/mp4")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_round_trip_canonical_strings() {
        for mime in [
            SupportedMime::Pdf,
            SupportedMime::Docx,
            SupportedMime::Odt,
            SupportedMime::Jpeg,
        ] {
            assert_eq!(SupportedMime::parse(mime.as_str()).unwrap(), mime);
        }
    }

    #[test]
    fn test_extension() {
        assert_eq!(SupportedMime::Docx.extension(), "docx");
        assert_eq!(SupportedMime::Jpeg.extension(), "jpg");
    }
}
