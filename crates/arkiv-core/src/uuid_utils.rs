//! UUID helpers.

use uuid::Uuid;

/// Generate a time-ordered UUIDv7.
///
/// Used for all persisted identifiers so that index locality follows
/// insertion order.
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
