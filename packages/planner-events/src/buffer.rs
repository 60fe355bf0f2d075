//! Event buffer: accumulate now, coalesce on drain.
//!
//! The owning component calls [`EventBuffer::add`] for every mutation while
//! it is changing. The notification layer calls
//! [`EventBuffer::consume_and_coalesce_events`] once per update cycle, which
//! drains the backlog and hands back the coalesced list.
//!
//! # Guarantees
//!
//! - **Single owner**: all operations take `&mut self`; callers with several
//!   producers must serialize access themselves
//! - **Drain resets**: after a drain the buffer is empty, and a second drain
//!   returns an empty list
//! - **Total**: draining never fails, whatever was added

use tracing::warn;

use crate::coalesce::coalesce;
use crate::event::PlannerEvent;
use crate::resource::Identified;

/// Default backlog size above which the buffer logs a warning.
pub const DEFAULT_BACKLOG_WARN_THRESHOLD: usize = 10_000;

/// Accumulate events and drain them as a coalesced batch.
pub trait EventBuffer<E> {
    /// Append one event to the backlog.
    fn add(&mut self, event: E);

    /// Returns `true` if no events are buffered.
    fn is_empty(&self) -> bool;

    /// Drain the backlog and return the minimal equivalent event list.
    fn consume_and_coalesce_events(&mut self) -> Vec<E>;
}

/// Buffer for planner events.
///
/// # Example
///
/// ```ignore
/// let mut buffer = PlannerEventBuffer::new();
/// buffer.add(PlannerEvent::inserted(vec![r0.clone(), r1.clone()])?);
/// buffer.add(PlannerEvent::inserted(vec![r2.clone()])?);
///
/// let events = buffer.consume_and_coalesce_events();
/// assert_eq!(events.len(), 1); // one insert carrying r0, r1, r2
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug)]
pub struct PlannerEventBuffer<R> {
    backlog: Vec<PlannerEvent<R>>,
    warn_threshold: usize,
    warned: bool,
}

impl<R> PlannerEventBuffer<R> {
    /// Create an empty buffer with the default warn threshold.
    pub fn new() -> Self {
        Self::with_warn_threshold(DEFAULT_BACKLOG_WARN_THRESHOLD)
    }

    /// Create an empty buffer that warns once its backlog grows past `threshold`.
    ///
    /// A backlog that large usually means the owner never leaves its
    /// changing state, so nothing is ever drained.
    pub fn with_warn_threshold(threshold: usize) -> Self {
        Self {
            backlog: Vec::new(),
            warn_threshold: threshold,
            warned: false,
        }
    }

    /// Number of buffered (not yet coalesced) events.
    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    /// Returns `true` if no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// Drain the backlog without coalescing.
    pub fn consume_events(&mut self) -> Vec<PlannerEvent<R>> {
        self.warned = false;
        std::mem::take(&mut self.backlog)
    }
}

impl<R> Default for PlannerEventBuffer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Identified + Clone> EventBuffer<PlannerEvent<R>> for PlannerEventBuffer<R> {
    fn add(&mut self, event: PlannerEvent<R>) {
        self.backlog.push(event);
        if !self.warned && self.backlog.len() > self.warn_threshold {
            self.warned = true;
            warn!(
                backlog = self.backlog.len(),
                threshold = self.warn_threshold,
                "planner event backlog exceeds threshold"
            );
        }
    }

    fn is_empty(&self) -> bool {
        PlannerEventBuffer::is_empty(self)
    }

    fn consume_and_coalesce_events(&mut self) -> Vec<PlannerEvent<R>> {
        coalesce(self.consume_events())
    }
}
