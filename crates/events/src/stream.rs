//! Consumer-group stream abstraction.
//!
//! [`StreamClient`] is the boundary between the ingestion loop and the
//! durable stream backend. The production implementation is
//! [`RedisStreamClient`](crate::redis_stream::RedisStreamClient); tests drive
//! the loop with in-process fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Field the producer stores the JSON payload under.
pub const PAYLOAD_FIELD: &str = "data";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One entry read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Backend-assigned, monotonically increasing id (e.g. `"1700000000000-0"`).
    pub id: String,
    /// Raw field/value pairs. Order is unspecified; look fields up by name.
    pub fields: Vec<(String, Vec<u8>)>,
}

impl StreamEntry {
    pub fn new(id: impl Into<String>, fields: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Convenience constructor for an entry carrying a single `data` payload.
    pub fn with_payload(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(id, vec![(PAYLOAD_FIELD.to_string(), payload.into())])
    }

    /// The payload bytes: the `data` field, or the only field when the entry
    /// has exactly one.
    pub fn payload(&self) -> Option<&[u8]> {
        if let Some((_, value)) = self.fields.iter().find(|(name, _)| name == PAYLOAD_FIELD) {
            return Some(value.as_slice());
        }
        match self.fields.as_slice() {
            [(_, value)] => Some(value.as_slice()),
            _ => None,
        }
    }
}

/// Outcome of [`StreamClient::ensure_consumer_group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Created,
    /// The group was already there; its cursor is untouched.
    AlreadyExists,
}

/// Where a group read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadCursor {
    /// Entries never delivered to this group (`>`).
    New,
    /// This consumer's delivered-but-unacknowledged entries with ids greater
    /// than `after` (`"0"` for all of them).
    Pending { after: String },
}

impl ReadCursor {
    pub fn pending_from_start() -> Self {
        ReadCursor::Pending {
            after: "0".to_string(),
        }
    }

    /// The id argument to pass to the backend.
    pub fn as_id(&self) -> &str {
        match self {
            ReadCursor::New => ">",
            ReadCursor::Pending { after } => after,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ReadCursor::Pending { .. })
    }
}

/// Arguments for one blocking group read.
#[derive(Debug, Clone)]
pub struct GroupRead<'a> {
    pub stream: &'a str,
    pub group: &'a str,
    pub consumer: &'a str,
    pub cursor: &'a ReadCursor,
    /// Maximum number of entries to return.
    pub count: usize,
    /// How long to wait for new entries before returning empty.
    pub block: Duration,
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Failed to connect to stream backend: {0}")]
    Connect(#[source] redis::RedisError),

    /// Network or protocol failure talking to the backend.
    #[error("Stream backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// The consumer group no longer exists (e.g. the stream was deleted).
    #[error("Consumer group {group} does not exist on stream {stream}")]
    GroupMissing { stream: String, group: String },
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Create `group` on `stream` at the stream's tail, creating the stream
    /// if needed. An existing group is reported as
    /// [`GroupStatus::AlreadyExists`], never as an error.
    async fn ensure_consumer_group(
        &self,
        stream: &str,
        group: &str,
    ) -> Result<GroupStatus, StreamError>;

    /// One blocking read as a group member. Returns an empty vector when the
    /// wait elapses without entries.
    async fn read_group_blocking(
        &self,
        read: &GroupRead<'_>,
    ) -> Result<Vec<StreamEntry>, StreamError>;

    /// Mark entries as processed for `group`. Returns how many were pending.
    async fn acknowledge(
        &self,
        stream: &str,
        group: &str,
        ids: &[String],
    ) -> Result<u64, StreamError>;
}

#[async_trait]
impl<T: StreamClient + ?Sized> StreamClient for Arc<T> {
    async fn ensure_consumer_group(
        &self,
        stream: &str,
        group: &str,
    ) -> Result<GroupStatus, StreamError> {
        (**self).ensure_consumer_group(stream, group).await
    }

    async fn read_group_blocking(
        &self,
        read: &GroupRead<'_>,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        (**self).read_group_blocking(read).await
    }

    async fn acknowledge(
        &self,
        stream: &str,
        group: &str,
        ids: &[String],
    ) -> Result<u64, StreamError> {
        (**self).acknowledge(stream, group, ids).await
    }
}
