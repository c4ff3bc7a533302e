//! Structured logging schema and field name constants for arkiv.
//!
//! All crates use these constants for consistent structured logging
//! fields, so log aggregation tools can query by standardized names
//! across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, commit outcomes |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (attachment conversions, blob keys) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Client-supplied idempotency token for one commit attempt.
pub const OPERATION_ID: &str = "operation_id";

/// Subsystem originating the log event.
/// Values: "engine", "store", "convert", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "combiner", "staging", "executor", "job_queue"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "compose_create", "compose_update", "promote", "merge"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document UUID being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Attachment UUID being processed.
pub const ATTACHMENT_ID: &str = "attachment_id";

/// Blob key being promoted, uploaded, or deleted.
pub const BLOB_KEY: &str = "blob_key";

/// Job kind enqueued after a commit.
pub const JOB_KIND: &str = "job_kind";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte size of a blob or converted artifact.
pub const SIZE_BYTES: &str = "size_bytes";

/// Number of attachments involved in a combine or commit.
pub const ATTACHMENT_COUNT: &str = "attachment_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
