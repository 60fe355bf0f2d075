//! Structured error types for planner events.
//!
//! `PlannerError` provides pattern-matchable errors for everything that can go
//! wrong while *building* events, resources and activities. Coalescing itself
//! never fails: once an event exists it is well-formed, and every sequence of
//! well-formed events has a coalesced form.
//!
//! # Example
//!
//! ```ignore
//! use planner_events::{PlannerError, PlannerEvent};
//!
//! match PlannerEvent::from_code(raw_code, resources) {
//!     Ok(event) => buffer.add(event),
//!     Err(PlannerError::UnsupportedEventType { code }) => {
//!         tracing::warn!(code, "order changes are not buffered");
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! ```

use thiserror::Error;

use crate::resource::ResourceId;

/// Errors raised when constructing planner events or their payloads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlannerError {
    /// The numeric event type code is not part of the planner event enumeration.
    #[error("unknown planner event type code: {code}")]
    UnknownEventType { code: i32 },

    /// The code is reserved (resource order changes) but has no buffering rule.
    #[error("planner event type code {code} is reserved and not supported")]
    UnsupportedEventType { code: i32 },

    /// The same resource identity appears more than once in one event.
    #[error("resource {id} appears more than once in the same event")]
    DuplicateResource { id: ResourceId },

    /// A resource with this identity is already part of the planner.
    #[error("resource {id} is already part of the planner")]
    ResourceAlreadyAdded { id: ResourceId },

    /// An all-resources-deleted event must not carry resources.
    #[error("all-resources-deleted event must not carry resources (got {count})")]
    ResourcesOnAllDeleted { count: usize },

    /// An activity ends before it begins.
    #[error("activity ends before it begins")]
    InvalidActivityRange,

    /// An activity level outside of `[0.0, 1.0]`.
    #[error("activity level must be within [0.0, 1.0] (got {level})")]
    InvalidLevel { level: f32 },
}
