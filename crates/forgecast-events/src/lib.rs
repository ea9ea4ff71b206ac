#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Event bus for the forgecast publication pipeline.
//!
//! The bus provides a typed event enum, sequential identifiers, and support for
//! replaying recent events when subscribers reconnect. Internally it uses
//! `tokio::broadcast` with a bounded buffer; when the channel overflows, the
//! oldest events are dropped, matching the desired backpressure behaviour.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::error;
use uuid::Uuid;

/// Identifier assigned to each event emitted by the platform.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events published by the pipeline core.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A file entry advanced through a pipeline stage.
    FileEntryProgressed {
        /// Identifier of the file entry that progressed.
        file_entry_id: Uuid,
        /// Stage that just completed (e.g. "scan", "analyze").
        stage: String,
        /// Status recorded after the stage completed.
        status: String,
    },
    /// A file entry reached a terminal `UPLOADED` status.
    FileEntryCompleted {
        /// Identifier of the completed file entry.
        file_entry_id: Uuid,
        /// Standardized release name assigned during the Rename stage.
        release_name: String,
    },
    /// A file entry reached a terminal `FAILED` status.
    FileEntryFailed {
        /// Identifier of the failed file entry.
        file_entry_id: Uuid,
        /// Taxonomy kind describing the failure.
        error_kind: String,
        /// Human-readable description of the failure.
        message: String,
    },
    /// A duplicate-check matched an existing release on a tracker.
    DuplicateDetected {
        /// Identifier of the file entry being checked.
        file_entry_id: Uuid,
        /// Tracker slug on which the duplicate was found.
        tracker_slug: String,
        /// Remote URL of the existing release, when known.
        remote_url: Option<String>,
    },
    /// A file entry reached a terminal `CANCELLED` status.
    FileEntryCancelled {
        /// Identifier of the cancelled file entry.
        file_entry_id: Uuid,
    },
    /// Aggregate progress for a batch of file entries changed.
    BatchProgressed {
        /// Identifier of the batch.
        batch_id: Uuid,
        /// Number of file entries in the batch.
        total: u32,
        /// Number of file entries that completed successfully.
        completed: u32,
        /// Number of file entries that failed.
        failed: u32,
        /// Number of file entries that were cancelled.
        cancelled: u32,
    },
}

impl Event {
    /// Machine-friendly discriminator for event consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FileEntryProgressed { .. } => "file_entry_progressed",
            Self::FileEntryCompleted { .. } => "file_entry_completed",
            Self::FileEntryFailed { .. } => "file_entry_failed",
            Self::FileEntryCancelled { .. } => "file_entry_cancelled",
            Self::DuplicateDetected { .. } => "duplicate_detected",
            Self::BatchProgressed { .. } => "batch_progressed",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel uses the same capacity as the in-memory replay
    /// buffer, ensuring dropped events impact both structures consistently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(std::sync::atomic::AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event to the bus, assigning it a sequential identifier.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn publish(&self, event: Event) -> EventId {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.lock_buffer();
            for item in buffer.iter() {
                if item.id > since {
                    backlog.push_back(item.clone());
                }
            }
        }

        let receiver = self.sender.subscribe();
        EventStream { backlog, receiver }
    }

    /// Return a snapshot of buffered events newer than the supplied identifier.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn backlog_since(&self, since_id: EventId) -> Vec<EventEnvelope> {
        let buffer = self.lock_buffer();
        buffer
            .iter()
            .filter(|item| item.id > since_id)
            .cloned()
            .collect()
    }

    /// Returns the last assigned identifier, if any events have been published.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.lock_buffer();
        buffer.back().map(|event| event.id)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("event buffer mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events either from the replay backlog or from the
/// live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => self.receiver.recv().await.ok(),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn event_kinds_cover_all_variants() {
        let file_entry_id = Uuid::new_v4();
        let events = [
            Event::FileEntryProgressed {
                file_entry_id,
                stage: "scan".to_string(),
                status: "SCANNED".to_string(),
            },
            Event::FileEntryCompleted {
                file_entry_id,
                release_name: "The.Movie.2021.1080p.WEB-DL.H264-X".to_string(),
            },
            Event::FileEntryFailed {
                file_entry_id,
                error_kind: "trackerpermanent".to_string(),
                message: "upload rejected".to_string(),
            },
            Event::FileEntryCancelled { file_entry_id },
            Event::DuplicateDetected {
                file_entry_id,
                tracker_slug: "demo".to_string(),
                remote_url: Some("https://demo.example/torrents/1".to_string()),
            },
            Event::BatchProgressed {
                batch_id: Uuid::new_v4(),
                total: 4,
                completed: 2,
                failed: 1,
                cancelled: 0,
            },
        ];

        let expected = [
            "file_entry_progressed",
            "file_entry_completed",
            "file_entry_failed",
            "file_entry_cancelled",
            "duplicate_detected",
            "batch_progressed",
        ];

        for (event, expected_kind) in events.iter().zip(expected) {
            assert_eq!(event.kind(), expected_kind);
        }
    }

    fn sample_event(id: usize) -> Event {
        Event::FileEntryProgressed {
            file_entry_id: Uuid::from_u128(id as u128 + 1),
            stage: "scan".to_string(),
            status: "SCANNED".to_string(),
        }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for i in 0..5 {
            last_id = bus.publish(sample_event(i));
        }
        assert_eq!(last_id, 5);

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event);
            }
        }

        assert_eq!(received.len(), 3);
        assert_eq!(received.first().unwrap().id, 3);
        assert_eq!(received.last().unwrap().id, 5);
    }

    #[tokio::test]
    async fn last_event_id_reflects_recent_publish() {
        let bus = EventBus::with_capacity(2);
        assert!(bus.last_event_id().is_none(), "no events published yet");
        let published = bus.publish(sample_event(0));
        assert_eq!(bus.last_event_id(), Some(published));
    }

    #[tokio::test]
    async fn subscribe_without_since_replays_all() {
        let bus = EventBus::with_capacity(4);
        for i in 0..3 {
            let _ = bus.publish(sample_event(i));
        }
        let mut stream = bus.subscribe(Some(0));
        let mut collected = Vec::new();
        for expected_id in 1..=3 {
            collected.push(
                timeout(PUBLISH_TIMEOUT, stream.next())
                    .await
                    .expect("stream stalled")
                    .expect("stream closed"),
            );
            assert_eq!(collected.last().unwrap().id, expected_id);
        }
        assert_eq!(collected.len(), 3);
    }

    #[tokio::test]
    async fn stream_returns_none_after_sender_dropped() {
        let mut stream = {
            let bus = EventBus::with_capacity(1);
            let stream = bus.subscribe(None);
            drop(bus);
            stream
        };
        assert!(
            stream.next().await.is_none(),
            "closing the sender should end the stream"
        );
    }
}
