//! Environment variable names and default values shared across crates.

/// PostgreSQL connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Root directory of the filesystem blob store.
pub const ENV_BLOB_ROOT: &str = "ARKIV_BLOB_ROOT";

/// Base URL of the external conversion service.
pub const ENV_CONVERT_BASE_URL: &str = "CONVERT_BASE_URL";

/// Request timeout for the conversion service, in seconds.
pub const ENV_CONVERT_TIMEOUT_SECS: &str = "CONVERT_TIMEOUT_SECS";

/// Default conversion request timeout. Office conversions of large
/// spreadsheets are slow; merges of many parts slower still.
pub const DEFAULT_CONVERT_TIMEOUT_SECS: u64 = 120;

/// Default blob store root when `ARKIV_BLOB_ROOT` is unset.
pub const DEFAULT_BLOB_ROOT: &str = "/var/arkiv/blobs";
