// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Chat records are listed by creation time. Two records written in the same
// instant share a `created_at`, so the id doubles as the ordering tiebreaker.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
