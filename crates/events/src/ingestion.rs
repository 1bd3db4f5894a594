//! Hook ingestion loop.
//!
//! [`HookIngestor`] consumes the hook outcome stream as a member of a
//! consumer group and turns every entry into a stored
//! [`HookRecord`](sendhooks_core::hook::HookRecord). It runs as a long-lived
//! background task and only stops when its [`CancellationToken`] fires.
//!
//! Delivery is at-least-once: an entry is acknowledged only after its record
//! is stored (or after it is found to be permanently undecodable). Anything
//! left unacknowledged stays in the group's pending list and is re-read by a
//! pending sweep at startup and after failures. [`HookStore::create`] is
//! idempotent on the entry id, so a replayed entry never produces a second
//! record.

use std::time::{Duration, Instant};

use sendhooks_core::hook::{decode_hook_event, DecodeError};
use sendhooks_db::{CreateOutcome, HookStore};
use tokio_util::sync::CancellationToken;

use crate::stream::{GroupRead, GroupStatus, ReadCursor, StreamClient, StreamEntry, StreamError};

/// Consumer name used by every process. Running two processes with the same
/// name against one group is unsupported.
pub const DEFAULT_CONSUMER: &str = "hooks-consumer";

const DEFAULT_BLOCK: Duration = Duration::from_millis(1000);
const DEFAULT_BATCH_SIZE: usize = 16;
const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_millis(500);
const DEFAULT_PENDING_RETRY_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Settings for a [`HookIngestor`].
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub stream: String,
    pub group: String,
    pub consumer: String,
    /// Blocking read timeout.
    pub block: Duration,
    /// Maximum entries fetched per read.
    pub batch_size: usize,
    /// Pause after a failed read before the next attempt.
    pub error_backoff: Duration,
    /// Minimum gap between a failure and the pending sweep that retries it.
    pub pending_retry_interval: Duration,
}

impl IngestionConfig {
    /// Config for `stream`/`group` with the default consumer name and timings.
    pub fn new(stream: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            group: group.into(),
            consumer: DEFAULT_CONSUMER.to_string(),
            block: DEFAULT_BLOCK,
            batch_size: DEFAULT_BATCH_SIZE,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            pending_retry_interval: DEFAULT_PENDING_RETRY_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// PollOutcome
// ---------------------------------------------------------------------------

/// What a single [`HookIngestor::poll_once`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Entries returned by the stream.
    pub read: usize,
    /// Records newly stored.
    pub persisted: usize,
    /// Entries whose record already existed (redeliveries).
    pub duplicates: usize,
    /// Entries discarded because their payload could not be decoded.
    pub decode_failures: usize,
    /// Entries left pending because the store rejected them.
    pub store_failures: usize,
    /// Entries acknowledged to the stream.
    pub acknowledged: usize,
    pub read_failed: bool,
    pub ack_failed: bool,
}

// ---------------------------------------------------------------------------
// HookIngestor
// ---------------------------------------------------------------------------

/// Reads hook outcome events from the stream and stores them.
pub struct HookIngestor<S, H> {
    stream: S,
    store: H,
    config: IngestionConfig,
    /// Cursor of the pending sweep in progress, if any.
    sweep_after: Option<String>,
    /// When the next pending sweep may start.
    next_sweep: Option<Instant>,
}

impl<S: StreamClient, H: HookStore> HookIngestor<S, H> {
    /// Create an ingestor. The first pass sweeps entries left pending by a
    /// previous run before reading new ones.
    pub fn new(stream: S, store: H, config: IngestionConfig) -> Self {
        Self {
            stream,
            store,
            config,
            sweep_after: None,
            next_sweep: Some(Instant::now()),
        }
    }

    /// Run until `cancel` fires: ensure the consumer group once, then poll
    /// forever.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            stream = %self.config.stream,
            group = %self.config.group,
            consumer = %self.config.consumer,
            block_ms = self.config.block.as_millis() as u64,
            "Hook ingestion starting"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Hook ingestion cancelled before start");
                return;
            }
            _ = self.ensure_group() => {}
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Hook ingestion stopping");
                    break;
                }
                outcome = self.poll_once() => {
                    if outcome.read > 0 {
                        tracing::debug!(
                            read = outcome.read,
                            persisted = outcome.persisted,
                            duplicates = outcome.duplicates,
                            decode_failures = outcome.decode_failures,
                            store_failures = outcome.store_failures,
                            "Processed hook batch"
                        );
                    }
                }
            }
        }
    }

    /// Create the consumer group if needed. Never fails: an existing group is
    /// the common case and any other error is logged so ingestion can still
    /// start (reads will surface the problem and retry).
    pub async fn ensure_group(&self) -> Option<GroupStatus> {
        let result = self
            .stream
            .ensure_consumer_group(&self.config.stream, &self.config.group)
            .await;

        match result {
            Ok(GroupStatus::Created) => {
                tracing::info!(
                    stream = %self.config.stream,
                    group = %self.config.group,
                    "Consumer group created"
                );
                Some(GroupStatus::Created)
            }
            Ok(GroupStatus::AlreadyExists) => {
                tracing::info!(
                    stream = %self.config.stream,
                    group = %self.config.group,
                    "Consumer group already exists"
                );
                Some(GroupStatus::AlreadyExists)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    stream = %self.config.stream,
                    group = %self.config.group,
                    "Failed to ensure consumer group, continuing"
                );
                None
            }
        }
    }

    /// One listening pass: a blocking read followed by processing of every
    /// returned entry in delivery order. Never fails; errors are logged and
    /// reflected in the returned [`PollOutcome`].
    pub async fn poll_once(&mut self) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        let mut cursor = self.next_cursor();
        let mut entries = match self.read(&cursor).await {
            Ok(entries) => entries,
            Err(e) => {
                self.handle_read_error(e, &mut outcome).await;
                return outcome;
            }
        };

        if cursor.is_pending() && entries.is_empty() {
            // Sweep finished; go straight back to listening for new entries.
            self.sweep_after = None;
            tracing::debug!("Pending sweep complete");
            cursor = ReadCursor::New;
            entries = match self.read(&cursor).await {
                Ok(entries) => entries,
                Err(e) => {
                    self.handle_read_error(e, &mut outcome).await;
                    return outcome;
                }
            };
        }

        if cursor.is_pending() {
            if let Some(last) = entries.last() {
                self.sweep_after = Some(last.id.clone());
            }
        }

        self.process_batch(&entries, &mut outcome).await;
        outcome
    }

    /// Pending sweep if one is running or due, otherwise new entries.
    fn next_cursor(&mut self) -> ReadCursor {
        if let Some(after) = &self.sweep_after {
            return ReadCursor::Pending {
                after: after.clone(),
            };
        }
        match self.next_sweep {
            Some(at) if Instant::now() >= at => {
                self.next_sweep = None;
                self.sweep_after = Some("0".to_string());
                tracing::debug!("Starting pending sweep");
                ReadCursor::pending_from_start()
            }
            _ => ReadCursor::New,
        }
    }

    async fn read(&self, cursor: &ReadCursor) -> Result<Vec<StreamEntry>, StreamError> {
        let read = GroupRead {
            stream: &self.config.stream,
            group: &self.config.group,
            consumer: &self.config.consumer,
            cursor,
            count: self.config.batch_size,
            block: self.config.block,
        };
        self.stream.read_group_blocking(&read).await
    }

    async fn handle_read_error(&mut self, err: StreamError, outcome: &mut PollOutcome) {
        outcome.read_failed = true;
        tracing::error!(error = %err, stream = %self.config.stream, "Error reading stream");

        if matches!(err, StreamError::GroupMissing { .. }) {
            self.ensure_group().await;
        }

        if !self.config.error_backoff.is_zero() {
            tokio::time::sleep(self.config.error_backoff).await;
        }
    }

    /// Decode, store, and acknowledge each entry. A failing entry never
    /// prevents the rest of the batch from being processed.
    async fn process_batch(&mut self, entries: &[StreamEntry], outcome: &mut PollOutcome) {
        outcome.read = entries.len();
        let mut settled: Vec<String> = Vec::with_capacity(entries.len());

        for entry in entries {
            let decoded = entry
                .payload()
                .ok_or_else(|| DecodeError::Malformed("entry has no payload field".into()))
                .and_then(|payload| decode_hook_event(&entry.id, payload));

            let record = match decoded {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        entry_id = %entry.id,
                        kind = ?e.kind(),
                        error = %e,
                        "Discarding undecodable hook event"
                    );
                    outcome.decode_failures += 1;
                    settled.push(entry.id.clone());
                    continue;
                }
            };

            match self.store.create(record).await {
                Ok(CreateOutcome::Created(record)) => {
                    tracing::debug!(
                        entry_id = %entry.id,
                        status = %record.status,
                        "Hook recorded"
                    );
                    outcome.persisted += 1;
                    settled.push(entry.id.clone());
                }
                Ok(CreateOutcome::Existing(_)) => {
                    tracing::debug!(entry_id = %entry.id, "Hook already recorded, skipping");
                    outcome.duplicates += 1;
                    settled.push(entry.id.clone());
                }
                Err(e) => {
                    tracing::error!(
                        entry_id = %entry.id,
                        error = %e,
                        "Error creating hook, leaving entry pending"
                    );
                    outcome.store_failures += 1;
                    self.schedule_sweep();
                }
            }
        }

        if settled.is_empty() {
            return;
        }

        match self
            .stream
            .acknowledge(&self.config.stream, &self.config.group, &settled)
            .await
        {
            Ok(_) => outcome.acknowledged = settled.len(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    count = settled.len(),
                    "Failed to acknowledge hook entries, they will be redelivered"
                );
                outcome.ack_failed = true;
                self.schedule_sweep();
            }
        }
    }

    fn schedule_sweep(&mut self) {
        if self.next_sweep.is_none() {
            self.next_sweep = Some(Instant::now() + self.config.pending_retry_interval);
        }
    }
}
