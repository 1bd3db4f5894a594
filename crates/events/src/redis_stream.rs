//! Redis streams implementation of [`StreamClient`].
//!
//! Uses a [`ConnectionManager`] so a dropped connection is re-established
//! transparently; a command issued while reconnecting fails with a
//! [`StreamError::Backend`] and the ingestion loop retries on its next pass.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, IntoConnectionInfo, RedisError};

use crate::stream::{GroupRead, GroupStatus, StreamClient, StreamEntry, StreamError};

/// Error code Redis returns from `XGROUP CREATE` for an existing group.
const BUSYGROUP: &str = "BUSYGROUP";

/// Error code Redis returns when reading from a group that does not exist.
const NOGROUP: &str = "NOGROUP";

/// [`StreamClient`] over a Redis server.
#[derive(Clone)]
pub struct RedisStreamClient {
    conn: ConnectionManager,
}

impl RedisStreamClient {
    /// Connect to a Redis server described by a URL (`redis://` or
    /// `rediss://`) or a [`redis::ConnectionInfo`].
    pub async fn connect<T: IntoConnectionInfo>(info: T) -> Result<Self, StreamError> {
        let client = redis::Client::open(info).map_err(StreamError::Connect)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(StreamError::Connect)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StreamClient for RedisStreamClient {
    async fn ensure_consumer_group(
        &self,
        stream: &str,
        group: &str,
    ) -> Result<GroupStatus, StreamError> {
        let mut conn = self.conn.clone();
        let result: Result<(), RedisError> = conn.xgroup_create_mkstream(stream, group, "$").await;
        classify_group_create(result)
    }

    async fn read_group_blocking(
        &self,
        read: &GroupRead<'_>,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default()
            .group(read.group, read.consumer)
            .count(read.count)
            .block(read.block.as_millis() as usize);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[read.stream], &[read.cursor.as_id()], &options)
            .await
            .map_err(|e| classify_read_error(e, read))?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let entries = reply
            .keys
            .into_iter()
            .filter(|key| key.key == read.stream)
            .flat_map(|key| key.ids)
            .map(|stream_id| {
                let fields = stream_id
                    .map
                    .iter()
                    .filter_map(|(name, value)| {
                        redis::from_redis_value::<Vec<u8>>(value)
                            .ok()
                            .map(|bytes| (name.clone(), bytes))
                    })
                    .collect();
                StreamEntry::new(stream_id.id, fields)
            })
            .collect();

        Ok(entries)
    }

    async fn acknowledge(
        &self,
        stream: &str,
        group: &str,
        ids: &[String],
    ) -> Result<u64, StreamError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let acked: u64 = conn.xack(stream, group, ids).await?;
        Ok(acked)
    }
}

fn classify_group_create(result: Result<(), RedisError>) -> Result<GroupStatus, StreamError> {
    match result {
        Ok(()) => Ok(GroupStatus::Created),
        Err(e) if e.code() == Some(BUSYGROUP) => Ok(GroupStatus::AlreadyExists),
        Err(e) => Err(StreamError::Backend(e)),
    }
}

fn classify_read_error(err: RedisError, read: &GroupRead<'_>) -> StreamError {
    if err.code() == Some(NOGROUP) {
        StreamError::GroupMissing {
            stream: read.stream.to_string(),
            group: read.group.to_string(),
        }
    } else {
        StreamError::Backend(err)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use redis::ErrorKind;

    use super::*;
    use crate::stream::ReadCursor;

    fn read_args(cursor: &ReadCursor) -> GroupRead<'_> {
        GroupRead {
            stream: "hookStream",
            group: "sendhooks-group",
            consumer: "hooks-consumer",
            cursor,
            count: 16,
            block: Duration::from_millis(1),
        }
    }

    /// The error a `-CODE detail` server reply turns into.
    fn server_error(code: &str, detail: &str) -> RedisError {
        let reply = format!("-{code} {detail}\r\n");
        redis::parse_redis_value(reply.as_bytes())
            .unwrap()
            .extract_error()
            .unwrap_err()
    }

    #[test]
    fn busygroup_means_group_already_exists() {
        let err = server_error("BUSYGROUP", "Consumer Group name already exists");
        assert_matches!(classify_group_create(Err(err)), Ok(GroupStatus::AlreadyExists));
        assert_matches!(classify_group_create(Ok(())), Ok(GroupStatus::Created));
    }

    #[test]
    fn other_group_create_errors_are_backend_errors() {
        let err = server_error("WRONGTYPE", "Operation against a key holding the wrong kind of value");
        assert_matches!(classify_group_create(Err(err)), Err(StreamError::Backend(_)));
    }

    #[test]
    fn nogroup_read_error_is_group_missing() {
        let cursor = ReadCursor::New;
        let err = server_error("NOGROUP", "No such key 'hookStream' or consumer group");
        assert_matches!(
            classify_read_error(err, &read_args(&cursor)),
            StreamError::GroupMissing { stream, group }
                if stream == "hookStream" && group == "sendhooks-group"
        );
    }

    #[test]
    fn io_errors_classify_as_backend() {
        let cursor = ReadCursor::New;
        let err = RedisError::from((ErrorKind::IoError, "connection reset"));
        assert_matches!(
            classify_read_error(err, &read_args(&cursor)),
            StreamError::Backend(_)
        );
    }

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let result = RedisStreamClient::connect("not a url").await;
        assert_matches!(result.err(), Some(StreamError::Connect(_)));
    }
}
