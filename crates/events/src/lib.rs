//! Stream ingestion for hook delivery outcomes.
//!
//! - [`StreamClient`] — the consumer-group stream seam, implemented for
//!   Redis streams by [`RedisStreamClient`].
//! - [`HookIngestor`] — long-running loop that reads the stream as a group
//!   member, decodes each entry into a hook record, persists it, and
//!   acknowledges it once stored.

pub mod ingestion;
pub mod redis_stream;
pub mod stream;

pub use ingestion::{HookIngestor, IngestionConfig, PollOutcome, DEFAULT_CONSUMER};
pub use redis_stream::RedisStreamClient;
pub use stream::{GroupRead, GroupStatus, ReadCursor, StreamClient, StreamEntry, StreamError};
