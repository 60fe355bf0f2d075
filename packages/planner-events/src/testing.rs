//! Testing utilities for planner event buffers.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! planner-events = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ## Using `assert_coalesced!` Macro
//!
//! ```ignore
//! use planner_events::testing::{assert_coalesced, pick, test_resources};
//! use planner_events::PlannerEventType::*;
//!
//! let r = test_resources(3);
//! let mut buffer = PlannerEventBuffer::new();
//! buffer.add(PlannerEvent::inserted(pick(&r, &[0, 1]))?);
//! buffer.add(PlannerEvent::inserted(pick(&r, &[2]))?);
//! let events = buffer.consume_and_coalesce_events();
//!
//! assert_coalesced!(events, ResourcesInserted => [0, 1, 2]);
//! ```
//!
//! ## Using Fluent Builder
//!
//! ```ignore
//! use planner_events::testing::CoalesceTest;
//!
//! CoalesceTest::with_resources(4)
//!     .given_inserted(&[0, 1])
//!     .then_updated(&[0, 2])
//!     .then_deleted(&[0, 3])
//!     .expect_count(3)
//!     .expect_event(0, ResourcesInserted, &[1])
//!     .expect_event(1, ResourcesUpdated, &[2])
//!     .expect_event(2, ResourcesDeleted, &[3]);
//! ```

use tokio::sync::broadcast;

use crate::buffer::{EventBuffer, PlannerEventBuffer};
use crate::bus::PlannerNotification;
use crate::event::{PlannerEvent, PlannerEventType};
use crate::resource::{Resource, ResourceCell};

/// Resource type used throughout the helpers: `u32` keys for both resources
/// and activities.
pub type TestResource = Resource<u32, u32>;

/// Create `count` fresh resources with keys `0..count` and cell text `r{key}`.
pub fn test_resources(count: u32) -> Vec<TestResource> {
    (0..count)
        .map(|key| Resource::new(key, ResourceCell::new(format!("r{key}"))))
        .collect()
}

/// Snapshots of the resources at the given keys.
///
/// # Panics
///
/// Panics if a key is out of range.
pub fn pick(all: &[TestResource], keys: &[u32]) -> Vec<TestResource> {
    keys.iter().map(|k| all[*k as usize].clone()).collect()
}

/// A snapshot of `resource` (same identity) with a different cell text.
pub fn with_text(resource: &TestResource, text: &str) -> TestResource {
    let mut snapshot = resource.clone();
    snapshot.set_cell(ResourceCell::new(text));
    snapshot
}

/// Keys of the resources carried by an event.
pub fn event_keys(event: &PlannerEvent<TestResource>) -> Vec<u32> {
    event.resources().iter().map(|r| *r.key()).collect()
}

/// Type and resource keys of every event, for whole-list comparisons.
pub fn event_shape(events: &[PlannerEvent<TestResource>]) -> Vec<(PlannerEventType, Vec<u32>)> {
    events
        .iter()
        .map(|e| (e.event_type(), event_keys(e)))
        .collect()
}

/// Collect every notification currently queued on a receiver, without waiting.
pub fn drain_notifications<R: Clone>(
    receiver: &mut broadcast::Receiver<PlannerNotification<R>>,
) -> Vec<PlannerNotification<R>> {
    let mut out = Vec::new();
    while let Ok(notification) = receiver.try_recv() {
        out.push(notification);
    }
    out
}

/// Asserts the type and resource keys of a coalesced event list.
///
/// # Syntax
///
/// ```ignore
/// assert_coalesced!(
///     events,
///     ResourcesInserted => [1],
///     ResourcesUpdated => [2],
/// );
/// ```
///
/// # Panics
///
/// Panics if the number of events or any type/key list differs.
#[macro_export]
macro_rules! assert_coalesced {
    ($events:expr $(,)?) => {
        assert!(
            $events.is_empty(),
            "Expected no events, got {:?}",
            $crate::testing::event_shape(&$events)
        );
    };
    ($events:expr, $($event_type:expr => [$($key:expr),* $(,)?]),+ $(,)?) => {
        let actual = $crate::testing::event_shape(&$events);
        let expected: Vec<($crate::PlannerEventType, Vec<u32>)> =
            vec![$(($event_type, vec![$($key),*])),+];
        assert_eq!(
            actual, expected,
            "Unexpected coalesced events\n  expected: {:?}\n  actual: {:?}",
            expected, actual
        );
    };
}

pub use assert_coalesced;

/// Fluent test builder for coalescing scenarios.
///
/// Events are added to a fresh [`PlannerEventBuffer`]; the first `expect_*`
/// call drains it.
pub struct CoalesceTest {
    resources: Vec<TestResource>,
    buffer: PlannerEventBuffer<TestResource>,
    coalesced: Option<Vec<PlannerEvent<TestResource>>>,
}

impl CoalesceTest {
    /// Start a scenario over `count` fresh resources with keys `0..count`.
    pub fn with_resources(count: u32) -> Self {
        Self {
            resources: test_resources(count),
            buffer: PlannerEventBuffer::new(),
            coalesced: None,
        }
    }

    /// The resources of the scenario.
    pub fn resources(&self) -> &[TestResource] {
        &self.resources
    }

    /// Add an arbitrary event.
    pub fn given(mut self, event: PlannerEvent<TestResource>) -> Self {
        assert!(
            self.coalesced.is_none(),
            "events must be added before the first expectation"
        );
        self.buffer.add(event);
        self
    }

    /// Alias of [`given`](Self::given) for readability in longer chains.
    pub fn then(self, event: PlannerEvent<TestResource>) -> Self {
        self.given(event)
    }

    pub fn given_inserted(self, keys: &[u32]) -> Self {
        let event = self.event(PlannerEventType::ResourcesInserted, keys);
        self.given(event)
    }

    pub fn then_inserted(self, keys: &[u32]) -> Self {
        self.given_inserted(keys)
    }

    pub fn given_updated(self, keys: &[u32]) -> Self {
        let event = self.event(PlannerEventType::ResourcesUpdated, keys);
        self.given(event)
    }

    pub fn then_updated(self, keys: &[u32]) -> Self {
        self.given_updated(keys)
    }

    pub fn then_deleted(self, keys: &[u32]) -> Self {
        let event = self.event(PlannerEventType::ResourcesDeleted, keys);
        self.given(event)
    }

    pub fn then_selected(self, keys: &[u32]) -> Self {
        let event = self.event(PlannerEventType::ResourcesSelected, keys);
        self.given(event)
    }

    pub fn then_all_deleted(self) -> Self {
        self.given(PlannerEvent::all_deleted())
    }

    /// Assert the number of coalesced events.
    pub fn expect_count(mut self, count: usize) -> Self {
        let events = self.coalesced();
        assert_eq!(
            events.len(),
            count,
            "Event count mismatch: {:?}",
            event_shape(events)
        );
        self
    }

    /// Assert type and keys of the coalesced event at `index`.
    pub fn expect_event(mut self, index: usize, event_type: PlannerEventType, keys: &[u32]) -> Self {
        let events = self.coalesced();
        let event = events
            .get(index)
            .unwrap_or_else(|| panic!("No event at index {index}: {:?}", event_shape(events)));
        assert_eq!(event.event_type(), event_type, "Type mismatch at index {index}");
        assert_eq!(event_keys(event), keys, "Key mismatch at index {index}");
        self
    }

    /// Assert a predicate over the coalesced events.
    pub fn assert_events<F>(mut self, predicate: F) -> Self
    where
        F: FnOnce(&[PlannerEvent<TestResource>]) -> bool,
    {
        let events = self.coalesced();
        assert!(
            predicate(events),
            "Event predicate failed for {:?}",
            event_shape(events)
        );
        self
    }

    /// Consume the builder and return the coalesced events.
    pub fn into_events(mut self) -> Vec<PlannerEvent<TestResource>> {
        self.coalesced();
        self.coalesced.unwrap_or_default()
    }

    fn coalesced(&mut self) -> &[PlannerEvent<TestResource>] {
        let buffer = &mut self.buffer;
        self.coalesced
            .get_or_insert_with(|| buffer.consume_and_coalesce_events())
    }

    fn event(&self, event_type: PlannerEventType, keys: &[u32]) -> PlannerEvent<TestResource> {
        PlannerEvent::new(event_type, pick(&self.resources, keys))
            .unwrap_or_else(|e| panic!("invalid test event: {e}"))
    }
}
