//! # Event Bus System
//!
//! Progress reporting for the archive core using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: `PipelineEvent` for per-file/per-volume conversion and
//!   upload progress, `ReconcileEvent` for diff and apply outcomes
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! Volume jobs emit concurrently. Events from one volume arrive in the order
//! they were emitted; there is no ordering across volumes.
//!
//! Emission never fails the caller: components call `emit(..).ok()` and a bus
//! without subscribers simply drops the event.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PipelineEvent, PipelineStage};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Pipeline(PipelineEvent::VolumeCompleted {
//!         stage: PipelineStage::Convert,
//!         volume: 1,
//!         files: 24,
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.volume(), Some(1));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Per-file progress is chatty; subscribers that can't keep up will receive
/// `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Conversion and upload progress
    Pipeline(PipelineEvent),
    /// Diff and apply progress
    Reconcile(ReconcileEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Pipeline(e) => e.description(),
            CoreEvent::Reconcile(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Pipeline(PipelineEvent::VolumeFailed { .. }) => EventSeverity::Error,
            CoreEvent::Reconcile(ReconcileEvent::CircuitOpened { .. }) => EventSeverity::Error,
            CoreEvent::Reconcile(ReconcileEvent::EntryFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Pipeline(PipelineEvent::VolumeCompleted { .. })
            | CoreEvent::Reconcile(ReconcileEvent::Planned { .. })
            | CoreEvent::Reconcile(ReconcileEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Volume number the event refers to, if any.
    pub fn volume(&self) -> Option<u32> {
        match self {
            CoreEvent::Pipeline(PipelineEvent::FileProcessed { volume, .. })
            | CoreEvent::Pipeline(PipelineEvent::VolumeStarted { volume, .. })
            | CoreEvent::Pipeline(PipelineEvent::VolumeCompleted { volume, .. })
            | CoreEvent::Pipeline(PipelineEvent::VolumeFailed { volume, .. })
            | CoreEvent::Reconcile(ReconcileEvent::EntryApplied { volume, .. })
            | CoreEvent::Reconcile(ReconcileEvent::EntrySkipped { volume, .. })
            | CoreEvent::Reconcile(ReconcileEvent::EntryFailed { volume, .. }) => Some(*volume),
            _ => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Pipeline Events
// ============================================================================

/// Which half of the publish pipeline produced an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PipelineStage {
    Convert,
    Upload,
}

/// Events emitted by conversion and upload volume jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PipelineEvent {
    /// A volume job acquired a worker slot.
    VolumeStarted {
        stage: PipelineStage,
        volume: u32,
        /// Number of files the job will process.
        files: u64,
    },
    /// One file within a volume finished.
    FileProcessed {
        stage: PipelineStage,
        volume: u32,
        /// 1-based position of the file within the volume.
        index: u64,
        total: u64,
        /// Output name (e.g. `003.webp`).
        name: String,
    },
    /// A volume job finished successfully.
    VolumeCompleted {
        stage: PipelineStage,
        volume: u32,
        files: u64,
    },
    /// A volume job aborted.
    VolumeFailed {
        stage: PipelineStage,
        volume: u32,
        message: String,
    },
}

impl PipelineEvent {
    fn description(&self) -> &str {
        match self {
            PipelineEvent::VolumeStarted { .. } => "Volume job started",
            PipelineEvent::FileProcessed { .. } => "File processed",
            PipelineEvent::VolumeCompleted { .. } => "Volume job completed",
            PipelineEvent::VolumeFailed { .. } => "Volume job failed",
        }
    }
}

// ============================================================================
// Reconcile Events
// ============================================================================

/// Events emitted while diffing and applying a change set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ReconcileEvent {
    /// A change set was computed.
    Planned {
        slug: String,
        matched: u64,
        to_add: u64,
        to_update: u64,
        orphaned: u64,
    },
    /// A change entry was written to the catalog.
    EntryApplied {
        slug: String,
        volume: u32,
        action: String,
        page_count: u32,
    },
    /// A change entry was recovered as skipped (duplicate or unsupported).
    EntrySkipped {
        slug: String,
        volume: u32,
        reason: String,
    },
    /// A change entry failed.
    EntryFailed {
        slug: String,
        volume: u32,
        message: String,
    },
    /// Too many failures; remaining entries were not attempted.
    CircuitOpened {
        slug: String,
        failures: u64,
        unattempted: u64,
    },
    /// The apply run finished (halted or not).
    Completed {
        slug: String,
        added: u64,
        updated: u64,
        skipped: u64,
        failed: u64,
    },
}

impl ReconcileEvent {
    fn description(&self) -> &str {
        match self {
            ReconcileEvent::Planned { .. } => "Change set computed",
            ReconcileEvent::EntryApplied { .. } => "Change applied",
            ReconcileEvent::EntrySkipped { .. } => "Change skipped",
            ReconcileEvent::EntryFailed { .. } => "Change failed",
            ReconcileEvent::CircuitOpened { .. } => "Apply halted after repeated failures",
            ReconcileEvent::Completed { .. } => "Apply finished",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// Cloning the bus is cheap and every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let reconcile_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Reconcile(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events that match `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(volume: u32) -> CoreEvent {
        CoreEvent::Pipeline(PipelineEvent::VolumeCompleted {
            stage: PipelineStage::Convert,
            volume,
            files: 10,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(completed(1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(completed(2)).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), completed(2));
        assert_eq!(sub2.recv().await.unwrap(), completed(2));
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Reconcile(_)));

        bus.emit(completed(1)).unwrap();
        let reconcile = CoreEvent::Reconcile(ReconcileEvent::Completed {
            slug: "alpha".to_string(),
            added: 1,
            updated: 0,
            skipped: 0,
            failed: 0,
        });
        bus.emit(reconcile.clone()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), reconcile);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for volume in 0..5 {
            bus.emit(completed(volume)).unwrap();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
    }

    #[test]
    fn test_severity_and_volume() {
        let failed = CoreEvent::Pipeline(PipelineEvent::VolumeFailed {
            stage: PipelineStage::Upload,
            volume: 7,
            message: "boom".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(failed.volume(), Some(7));
        assert_eq!(failed.description(), "Volume job failed");

        let planned = CoreEvent::Reconcile(ReconcileEvent::Planned {
            slug: "alpha".to_string(),
            matched: 1,
            to_add: 0,
            to_update: 0,
            orphaned: 0,
        });
        assert_eq!(planned.severity(), EventSeverity::Info);
        assert_eq!(planned.volume(), None);
    }

    #[test]
    fn test_event_serialization() {
        let event = completed(3);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Pipeline\""));
        assert!(json.contains("\"event\":\"VolumeCompleted\""));
        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
