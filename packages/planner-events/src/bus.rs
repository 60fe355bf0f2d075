//! Notification bus for broadcasting planner changes.
//!
//! # Guarantees
//!
//! - **At-most-once delivery**: Slow receivers may miss notifications
//! - **In-memory only**: Notifications are not persisted
//! - **No replay**: Lagged receivers get `RecvError::Lagged`
//!
//! A planner publishes a [`PlannerNotification::Changed`] for a mutation that
//! happens outside of a changing scope, and one
//! [`PlannerNotification::ChangedBatch`] with the coalesced events when the
//! outermost changing scope closes.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::event::PlannerEvent;

/// Default channel capacity for the notification bus.
pub const DEFAULT_CAPACITY: usize = 1024;

/// What subscribers of a [`PlannerEventBus`] receive.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "events", rename_all = "camelCase")]
pub enum PlannerNotification<R> {
    /// A single event fired outside of a changing scope.
    Changed(PlannerEvent<R>),
    /// The coalesced events of one changing scope.
    ChangedBatch(Arc<[PlannerEvent<R>]>),
}

impl<R> PlannerNotification<R> {
    /// The events carried by this notification, in order.
    pub fn events(&self) -> &[PlannerEvent<R>] {
        match self {
            PlannerNotification::Changed(event) => std::slice::from_ref(event),
            PlannerNotification::ChangedBatch(events) => &events[..],
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, PlannerNotification::ChangedBatch(_))
    }
}

impl<R: Serialize> PlannerNotification<R> {
    /// Render the notification as JSON for the UI layer.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Broadcast bus for planner notifications.
///
/// # Example
///
/// ```ignore
/// let bus = PlannerEventBus::new();
/// let mut receiver = bus.subscribe();
///
/// bus.publish_batch(planner_buffer.consume_and_coalesce_events());
///
/// let notification = receiver.recv().await?;
/// for event in notification.events() {
///     render(event);
/// }
/// ```
pub struct PlannerEventBus<R> {
    sender: broadcast::Sender<PlannerNotification<R>>,
}

impl<R: Clone> PlannerEventBus<R> {
    /// Create a new bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new bus with the specified capacity.
    ///
    /// The capacity determines how many notifications can be buffered before
    /// slow receivers start lagging. A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a single event.
    ///
    /// Returns the number of receivers that received it.
    pub fn publish(&self, event: PlannerEvent<R>) -> usize {
        self.sender
            .send(PlannerNotification::Changed(event))
            .unwrap_or(0)
    }

    /// Publish a batch of events as one notification.
    ///
    /// An empty batch is not published. Returns the number of receivers that
    /// received it.
    pub fn publish_batch(&self, events: Vec<PlannerEvent<R>>) -> usize {
        if events.is_empty() {
            return 0;
        }
        self.sender
            .send(PlannerNotification::ChangedBatch(events.into()))
            .unwrap_or(0)
    }

    /// Subscribe to notifications on this bus.
    ///
    /// Notifications published before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlannerNotification<R>> {
        self.sender.subscribe()
    }
}

impl<R> PlannerEventBus<R> {
    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<R: Clone> Default for PlannerEventBus<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for PlannerEventBus<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<R> std::fmt::Debug for PlannerEventBus<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerEventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
