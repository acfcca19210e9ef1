/// Job identifiers are opaque strings assigned by the queue or the job table.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
