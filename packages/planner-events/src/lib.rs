//! # Planner Events
//!
//! Change events for a resource/activity planner, with a buffer that
//! coalesces everything fired during a batch of mutations into the smallest
//! equivalent sequence before it reaches the UI.
//!
//! ## Core Concepts
//!
//! - [`Resource`] = a row of the planner, owning its [`Activity`] entries
//! - [`PlannerEvent`] = what happened to which resources
//! - [`PlannerEventBuffer`] = events collected while the planner is changing
//!
//! The key principle: **observers of the coalesced sequence end in the same
//! state as observers of the raw sequence**.
//!
//! ## Architecture
//!
//! ```text
//! Planner mutation (add / update / delete / select)
//!     │
//!     ▼ fire()
//! changing? ──── no ──► PlannerEventBus.publish(event)
//!     │                          │
//!    yes                         │
//!     │                          │
//!     ▼ add()                    │
//! PlannerEventBuffer             │
//!     │                          │
//!     ▼ outermost scope closes   │
//! consume_and_coalesce_events()  │
//!     │                          │
//!     └─► publish_batch(events) ─┤
//!                                ▼
//!                         subscribe() receivers
//! ```
//!
//! ## Coalescing Rules
//!
//! 1. **Reset wins** - nothing before the last all-deleted event survives
//! 2. **Last selection wins** - only the newest selection event is kept
//! 3. **Insert absorbs updates** - an update of a pending insert replaces the snapshot
//! 4. **Insert and delete cancel** - a resource inserted and deleted in one batch vanishes
//! 5. **Neighbours merge** - adjacent row mutations of the same type become one event
//!
//! ## Example
//!
//! ```ignore
//! use planner_events::{Planner, Resource, ResourceCell};
//!
//! let mut planner: Planner<u32, u32> = Planner::new();
//! let mut receiver = planner.subscribe();
//!
//! planner.batch(|p| {
//!     let alice = Resource::new(1, ResourceCell::new("Alice"));
//!     let id = alice.id();
//!     p.add_resource(alice)?;
//!     p.select_resource(id);
//!     Ok::<_, planner_events::PlannerError>(())
//! })?;
//!
//! // One notification: [Inserted(Alice), Selected(Alice)]
//! let notification = receiver.recv().await?;
//! ```

// Core modules
mod buffer;
mod bus;
mod coalesce;
mod config;
mod error;
mod event;
mod planner;
mod resource;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

// Re-export resource types
pub use resource::{Activity, Identified, Resource, ResourceCell, ResourceId};

// Re-export event types
pub use event::{PlannerEvent, PlannerEventType};

// Re-export buffer types
pub use buffer::{EventBuffer, PlannerEventBuffer, DEFAULT_BACKLOG_WARN_THRESHOLD};
pub use coalesce::coalesce;

// Re-export bus types
pub use bus::{PlannerEventBus, PlannerNotification, DEFAULT_CAPACITY as DEFAULT_BUS_CAPACITY};

// Re-export planner types
pub use config::PlannerConfig;
pub use planner::Planner;

// Re-export error types
pub use crate::error::PlannerError;
