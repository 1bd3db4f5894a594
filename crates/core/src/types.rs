/// Hook records are keyed by their stream entry id (e.g. `"1700000000000-0"`).
pub type HookId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
