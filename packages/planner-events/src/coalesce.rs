//! Coalescing of buffered planner events.
//!
//! [`coalesce`] turns the drained backlog of a [`crate::PlannerEventBuffer`]
//! into the shortest event list with the same net effect for an observer.
//!
//! # Rules
//!
//! Events are processed in arrival order. Each event is folded into the
//! output built so far:
//!
//! | Incoming       | Effect on the output                                            |
//! |----------------|-----------------------------------------------------------------|
//! | all deleted    | everything before it is dropped, the marker is kept            |
//! | selected       | only the last selection survives                                |
//! | inserted       | strips the resources from earlier updates and selections        |
//! | updated        | absorbed into a pending insert of the same resource             |
//! | deleted        | strips earlier updates; cancels a pending insert entirely       |
//!
//! What remains of an insert/update/delete is appended to the output tail when
//! the tail has the same type, or pushed as a new event otherwise. Events whose
//! resource list runs empty are dropped; afterwards adjacent events of the same
//! type are merged once more.
//!
//! Resource lists keep first-seen order. When a resource shows up again in a
//! list it is already part of, its newer snapshot replaces the old one in place.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::event::{PlannerEvent, PlannerEventType};
use crate::resource::{Identified, ResourceId};

/// Working copy of an output event while coalescing.
///
/// Output events are rebuilt from scratch so events already handed out by
/// the buffer are never touched.
struct Pending<R> {
    event_type: PlannerEventType,
    resources: Vec<R>,
    ids: HashSet<ResourceId>,
}

impl<R: Identified> Pending<R> {
    fn new(event_type: PlannerEventType) -> Self {
        Self {
            event_type,
            resources: Vec::new(),
            ids: HashSet::new(),
        }
    }

    fn contains(&self, id: ResourceId) -> bool {
        self.ids.contains(&id)
    }

    /// Append a resource, or replace its snapshot if it is already present.
    fn upsert(&mut self, resource: R) {
        let id = resource.identity();
        if self.ids.insert(id) {
            self.resources.push(resource);
        } else if let Some(slot) = self.resources.iter_mut().find(|r| r.identity() == id) {
            *slot = resource;
        }
    }

    fn remove(&mut self, id: ResourceId) -> bool {
        if !self.ids.remove(&id) {
            return false;
        }
        self.resources.retain(|r| r.identity() != id);
        true
    }

    fn is_moot(&self) -> bool {
        self.event_type.is_row_mutation() && self.resources.is_empty()
    }

    fn into_event(self) -> PlannerEvent<R> {
        PlannerEvent::from_parts(self.event_type, self.resources)
    }
}

/// Reduce a list of events to an equivalent, minimal list.
///
/// Never fails: any list of well-formed events, including the empty list,
/// has a coalesced form.
pub fn coalesce<R: Identified + Clone>(events: Vec<PlannerEvent<R>>) -> Vec<PlannerEvent<R>> {
    let input_count = events.len();
    if input_count == 0 {
        return Vec::new();
    }

    let events = discard_before_reset(events);
    let last_selection = events
        .iter()
        .rposition(|e| e.event_type() == PlannerEventType::ResourcesSelected);

    let mut out: Vec<Pending<R>> = Vec::with_capacity(events.len());
    for (index, event) in events.into_iter().enumerate() {
        let (event_type, resources) = event.into_parts();
        match event_type {
            PlannerEventType::AllResourcesDeleted => {
                out.push(Pending::new(event_type));
            }
            PlannerEventType::ResourcesSelected => {
                if Some(index) == last_selection {
                    append(&mut out, event_type, resources);
                } else {
                    trace!(index, "dropping superseded selection");
                }
            }
            PlannerEventType::ResourcesInserted => apply_insert(&mut out, resources),
            PlannerEventType::ResourcesUpdated => apply_update(&mut out, resources),
            PlannerEventType::ResourcesDeleted => apply_delete(&mut out, resources),
        }
        out.retain(|p| !p.is_moot());
    }

    let out = merge_adjacent(out);
    debug!(
        input = input_count,
        output = out.len(),
        "coalesced planner events"
    );
    out.into_iter().map(Pending::into_event).collect()
}

/// Drop everything that precedes the last all-deleted marker.
fn discard_before_reset<R>(mut events: Vec<PlannerEvent<R>>) -> Vec<PlannerEvent<R>> {
    let reset = events
        .iter()
        .rposition(|e| e.event_type() == PlannerEventType::AllResourcesDeleted);
    if let Some(reset) = reset.filter(|&r| r > 0) {
        trace!(discarded = reset, "all resources deleted, dropping earlier events");
        events.drain(..reset);
    }
    events
}

/// Merge into the output tail if it has the same type, push otherwise.
fn append<R: Identified>(out: &mut Vec<Pending<R>>, event_type: PlannerEventType, resources: Vec<R>) {
    if resources.is_empty() && event_type.is_row_mutation() {
        return;
    }
    let merge_into_tail = event_type != PlannerEventType::ResourcesSelected
        && out.last().is_some_and(|tail| tail.event_type == event_type);
    if !merge_into_tail {
        out.push(Pending::new(event_type));
    }
    if let Some(tail) = out.last_mut() {
        for resource in resources {
            tail.upsert(resource);
        }
    }
}

fn apply_insert<R: Identified>(out: &mut Vec<Pending<R>>, resources: Vec<R>) {
    // Before the insert the resource does not exist for the observer.
    for resource in &resources {
        let id = resource.identity();
        for pending in out.iter_mut().filter(|p| {
            matches!(
                p.event_type,
                PlannerEventType::ResourcesUpdated | PlannerEventType::ResourcesSelected
            )
        }) {
            if pending.remove(id) {
                trace!(resource = %id, "inserted resource removed from earlier {}", pending.event_type);
            }
        }
    }
    append(out, PlannerEventType::ResourcesInserted, resources);
}

fn apply_update<R: Identified + Clone>(out: &mut Vec<Pending<R>>, resources: Vec<R>) {
    let mut remaining = Vec::with_capacity(resources.len());
    for resource in resources {
        let id = resource.identity();
        if pending_insert_of(out, id).is_none() {
            remaining.push(resource);
            continue;
        }

        trace!(resource = %id, "update absorbed into pending insert");
        // Later selections of the resource must not carry the old snapshot.
        for selection in out
            .iter_mut()
            .filter(|p| p.event_type == PlannerEventType::ResourcesSelected && p.contains(id))
        {
            selection.upsert(resource.clone());
        }
        if let Some(insert) = pending_insert_of(out, id) {
            insert.upsert(resource);
        }
    }
    append(out, PlannerEventType::ResourcesUpdated, remaining);
}

fn apply_delete<R: Identified>(out: &mut Vec<Pending<R>>, resources: Vec<R>) {
    let mut remaining = Vec::with_capacity(resources.len());
    for resource in resources {
        let id = resource.identity();
        for pending in out
            .iter_mut()
            .filter(|p| p.event_type == PlannerEventType::ResourcesUpdated)
        {
            pending.remove(id);
        }

        let cancelled = pending_insert_of(out, id).is_some_and(|insert| insert.remove(id));
        if cancelled {
            trace!(resource = %id, "insert and delete cancel out");
            // A resource the observer never receives cannot stay selected.
            for selection in out
                .iter_mut()
                .filter(|p| p.event_type == PlannerEventType::ResourcesSelected)
            {
                selection.remove(id);
            }
        } else {
            remaining.push(resource);
        }
    }
    append(out, PlannerEventType::ResourcesDeleted, remaining);
}

/// The most recent pending insert that still carries the resource.
fn pending_insert_of<R: Identified>(
    out: &mut [Pending<R>],
    id: ResourceId,
) -> Option<&mut Pending<R>> {
    out.iter_mut()
        .rev()
        .find(|p| p.event_type == PlannerEventType::ResourcesInserted && p.contains(id))
}

/// Merge neighbours of the same row-mutation type that became adjacent
/// after moot events were dropped.
fn merge_adjacent<R: Identified>(out: Vec<Pending<R>>) -> Vec<Pending<R>> {
    let mut merged: Vec<Pending<R>> = Vec::with_capacity(out.len());
    for pending in out {
        match merged.last_mut() {
            Some(tail)
                if tail.event_type == pending.event_type && pending.event_type.is_row_mutation() =>
            {
                for resource in pending.resources {
                    tail.upsert(resource);
                }
            }
            _ => merged.push(pending),
        }
    }
    merged
}
