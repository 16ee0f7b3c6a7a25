//! Typed event bus.
//!
//! The monitor talks to the outside world only through [`MonitorEvent`]s
//! published on an [`EventBus`]. Consumers subscribe and receive every
//! event published after they subscribed.
//!
//! # Example
//!
//! ```ignore
//! use netmend::monitor::events::MonitorEvent;
//! use tokio_stream::StreamExt;
//!
//! let mut events = handle.subscribe().into_stream();
//! while let Some(event) = events.next().await {
//!     match event {
//!         MonitorEvent::ManualFixNeeded { title, message } => {
//!             println!("{title}: {message}");
//!         }
//!         _ => {}
//!     }
//! }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{trace, warn};

use super::status::{ConnectionType, DeniedInterface, DetailedStatus};

/// Events emitted by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// The state changed (any transition other than no-change).
    StatusChanged {
        /// New detailed status.
        status: DetailedStatus,
        /// New connection type.
        connection_type: ConnectionType,
        /// New connected flag.
        is_connected: bool,
    },
    /// A repair attempt restored connectivity.
    RepairAttempted {
        /// Whether the attempt succeeded.
        success: bool,
        /// Status when the attempt finished.
        status: DetailedStatus,
        /// Human-readable summary.
        message: String,
    },
    /// Automatic repair failed; the user has to troubleshoot.
    ManualFixNeeded {
        /// Alert title.
        title: String,
        /// Troubleshooting checklist.
        message: String,
    },
    /// An interface appears blocked; the user has to grant access.
    PermissionFixNeeded {
        /// Alert title.
        title: String,
        /// Instructions.
        message: String,
        /// The blocked interface.
        #[serde(rename = "interface_type")]
        interface: DeniedInterface,
    },
}

impl MonitorEvent {
    /// Event name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::StatusChanged { .. } => "status_changed",
            MonitorEvent::RepairAttempted { .. } => "repair_attempted",
            MonitorEvent::ManualFixNeeded { .. } => "manual_fix_needed",
            MonitorEvent::PermissionFixNeeded { .. } => "permission_fix_needed",
        }
    }

    /// Returns true for the three repair outcome events.
    pub fn is_repair_outcome(&self) -> bool {
        !matches!(self, MonitorEvent::StatusChanged { .. })
    }
}

/// Broadcast channel for [`MonitorEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Create a bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a bus that buffers `capacity` events per slow subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers reached.
    pub fn emit(&self, event: MonitorEvent) -> usize {
        trace!(event = event.name(), "emitting");
        // No subscribers is not an error.
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of an [`EventBus`].
#[derive(Debug)]
pub struct EventSubscriber {
    receiver: broadcast::Receiver<MonitorEvent>,
}

impl EventSubscriber {
    /// Receive the next event.
    ///
    /// Returns `None` once the bus is gone. A subscriber that falls behind
    /// skips the overwritten events and keeps going.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an event if one is ready.
    pub fn try_recv(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Convert into a [`Stream`] of events.
    pub fn into_stream(self) -> EventStream {
        EventStream {
            inner: BroadcastStream::new(self.receiver),
        }
    }
}

/// Stream of [`MonitorEvent`]s.
pub struct EventStream {
    inner: BroadcastStream<MonitorEvent>,
}

impl Stream for EventStream {
    type Item = MonitorEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "event stream lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
