/// Render jobs are identified by UUIDv7 — time-ordered, assigned at
/// submission, opaque to callers.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
