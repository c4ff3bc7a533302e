//! Error types for arkiv.

use thiserror::Error;

/// Result type alias using arkiv's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for arkiv operations.
///
/// The composition engine guarantees that the classification assigned at
/// the point of failure survives to the caller unchanged: a validation
/// failure inside the relational transaction still surfaces as
/// [`Error::Validation`] after rollback and compensation have run.
#[derive(Error, Debug)]
pub enum Error {
    /// Change-set failed schema checks or referenced an unsupported mime type.
    /// Never mutates state.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Actor is not the document's author and lacks an elevated role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Target document or referenced attachment absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Attachment not found (or not owned by the target document)
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(uuid::Uuid),

    /// Content hash collides with an existing document on create.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Conversion service failure (network, timeout, non-2xx).
    #[error("Conversion service error: {0}")]
    ExternalService(String),

    /// Blob promotion/upload/download failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_status() {
            Error::ExternalService(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}

impl Error {
    /// Whether this error means the caller sent a bad request rather than
    /// the system failing. Used to pick log levels at commit boundaries.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Forbidden(_)
                | Error::NotFound(_)
                | Error::DocumentNotFound(_)
                | Error::AttachmentNotFound(_)
                | Error::Conflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("duplicate client id".to_string());
        assert_eq!(err.to_string(), "Validation error: duplicate client id");
    }

    #[test]
    fn test_error_display_document_not_found() {
        let id = Uuid::nil();
        let err = Error::DocumentNotFound(id);
        assert_eq!(err.to_string(), format!("Document not found: {}", id));
    }

    #[test]
    fn test_error_display_attachment_not_found() {
        let id = Uuid::new_v4();
        let err = Error::AttachmentNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("duplicate content hash".to_string());
        assert_eq!(err.to_string(), "Conflict: duplicate content hash");
    }

    #[test]
    fn test_error_display_external_service() {
        let err = Error::ExternalService("merge endpoint returned 502".to_string());
        assert_eq!(
            err.to_string(),
            "Conversion service error: merge endpoint returned 502"
        );
    }

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage("promotion failed".to_string());
        assert_eq!(err.to_string(), "Storage error: promotion failed");
    }

    #[test]
    fn test_error_display_forbidden() {
        let err = Error::Forbidden("not the document author".to_string());
        assert_eq!(err.to_string(), "Forbidden: not the document author");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_client_fault_classification() {
        assert!(Error::Validation("x".into()).is_client_fault());
        assert!(Error::Conflict("x".into()).is_client_fault());
        assert!(Error::Forbidden("x".into()).is_client_fault());
        assert!(!Error::Storage("x".into()).is_client_fault());
        assert!(!Error::ExternalService("x".into()).is_client_fault());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
