/// Job and edit primary keys are PostgreSQL UUIDs.
pub type DbId = uuid::Uuid;

/// Owning-user identifiers come from the external identity provider verbatim.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
