//! Planner model: owns resources and selection, drives the event buffer.
//!
//! Every mutating operation opens a *changing* scope. While the planner is
//! changing, events go into the [`PlannerEventBuffer`]. When the outermost
//! scope closes the buffer is drained, coalesced and published on the
//! [`PlannerEventBus`] as a single batch. Events fired outside of any scope
//! are published directly.
//!
//! ```text
//! add_resources()      ┐
//! update_resources()   ├─► fire() ──► changing? ──yes──► PlannerEventBuffer
//! select_resources()   ┘                 │                      │
//!                                        no                     ▼ scope closes
//!                                        │            consume_and_coalesce_events()
//!                                        ▼                      │
//!                                 bus.publish()        bus.publish_batch()
//! ```

use std::collections::HashSet;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::buffer::{EventBuffer, PlannerEventBuffer};
use crate::bus::{PlannerEventBus, PlannerNotification};
use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::event::{PlannerEvent, PlannerEventType};
use crate::resource::{Resource, ResourceId};

/// A planner holding resources with business keys `RI` and activity keys `AI`.
pub struct Planner<RI, AI> {
    resources: Vec<Resource<RI, AI>>,
    selected: Vec<ResourceId>,
    multi_select: bool,
    coalesce_events: bool,
    changing: usize,
    buffer: PlannerEventBuffer<Resource<RI, AI>>,
    bus: PlannerEventBus<Resource<RI, AI>>,
}

impl<RI, AI> Planner<RI, AI>
where
    RI: Clone + PartialEq,
    AI: Clone,
{
    /// Create a planner with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&PlannerConfig::default())
    }

    pub fn with_config(config: &PlannerConfig) -> Self {
        Self {
            resources: Vec::new(),
            selected: Vec::new(),
            multi_select: config.multi_select,
            coalesce_events: config.coalesce_events,
            changing: 0,
            buffer: PlannerEventBuffer::with_warn_threshold(config.backlog_warn_threshold),
            bus: PlannerEventBus::with_capacity(config.bus_capacity),
        }
    }

    /// The bus on which this planner publishes its notifications.
    pub fn bus(&self) -> &PlannerEventBus<Resource<RI, AI>> {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlannerNotification<Resource<RI, AI>>> {
        self.bus.subscribe()
    }

    // -------------------------------------------------------------------------
    // Resources
    // -------------------------------------------------------------------------

    pub fn resources(&self) -> &[Resource<RI, AI>] {
        &self.resources
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource<RI, AI>> {
        self.resources.iter().find(|r| r.id() == id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn add_resource(&mut self, resource: Resource<RI, AI>) -> Result<(), PlannerError> {
        self.add_resources(vec![resource])
    }

    /// Append resources and fire an insert.
    ///
    /// Fails without changing anything if a resource is already part of the
    /// planner or appears twice in `resources`.
    pub fn add_resources(&mut self, resources: Vec<Resource<RI, AI>>) -> Result<(), PlannerError> {
        if let Some(existing) = resources.iter().find(|r| self.resource(r.id()).is_some()) {
            return Err(PlannerError::ResourceAlreadyAdded { id: existing.id() });
        }
        let event = PlannerEvent::inserted(resources.clone())?;

        self.batch(|planner| {
            planner.resources.extend(resources);
            planner.fire(event);
        });
        Ok(())
    }

    pub fn update_resource(&mut self, resource: Resource<RI, AI>) -> Result<(), PlannerError> {
        self.update_resources(vec![resource])
    }

    /// Replace the stored snapshots of the given resources and fire an update.
    ///
    /// Resources that are not part of the planner are ignored. Nothing is
    /// fired if none of them is known.
    pub fn update_resources(&mut self, resources: Vec<Resource<RI, AI>>) -> Result<(), PlannerError> {
        let known: Vec<Resource<RI, AI>> = resources
            .into_iter()
            .filter(|r| self.resource(r.id()).is_some())
            .collect();
        if known.is_empty() {
            return Ok(());
        }
        let event = PlannerEvent::updated(known.clone())?;

        self.batch(|planner| {
            for snapshot in known {
                if let Some(slot) = planner.resources.iter_mut().find(|r| r.id() == snapshot.id()) {
                    *slot = snapshot;
                }
            }
            planner.fire(event);
        });
        Ok(())
    }

    pub fn delete_resource(&mut self, id: ResourceId) {
        self.delete_resources(&[id]);
    }

    /// Remove resources by identity.
    ///
    /// Fires an all-deleted event once no resource is left, a delete event
    /// otherwise. Deleted resources are removed from the selection.
    pub fn delete_resources(&mut self, ids: &[ResourceId]) {
        self.batch(|planner| {
            let doomed: HashSet<ResourceId> = ids.iter().copied().collect();
            let (deleted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut planner.resources)
                .into_iter()
                .partition(|r| doomed.contains(&r.id()));
            planner.resources = kept;

            if planner.resources.is_empty() {
                planner.fire(PlannerEvent::all_deleted());
                planner.deselect_all_resources();
            } else if !deleted.is_empty() {
                let deleted_ids: Vec<ResourceId> = deleted.iter().map(Resource::id).collect();
                planner.fire(PlannerEvent::from_parts(
                    PlannerEventType::ResourcesDeleted,
                    deleted,
                ));
                planner.deselect_resources(&deleted_ids);
            }
        });
    }

    pub fn delete_all_resources(&mut self) {
        let ids: Vec<ResourceId> = self.resources.iter().map(Resource::id).collect();
        self.delete_resources(&ids);
    }

    /// Replace all resources, keeping the selection of resources whose
    /// business keys are still present.
    ///
    /// Fails without changing anything if a resource appears twice in
    /// `resources`.
    pub fn replace_resources(&mut self, resources: Vec<Resource<RI, AI>>) -> Result<(), PlannerError> {
        PlannerEvent::inserted(resources.clone())?;

        self.batch(|planner| {
            let selected_keys = planner.selected_resource_keys();
            planner.delete_all_resources();
            planner.add_resources(resources)?;

            let restored: Vec<ResourceId> = planner
                .resources
                .iter()
                .filter(|r| selected_keys.contains(r.key()))
                .map(Resource::id)
                .collect();
            planner.select_resources(&restored);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    pub fn selected_resources(&self) -> Vec<&Resource<RI, AI>> {
        self.selected.iter().filter_map(|id| self.resource(*id)).collect()
    }

    pub fn selected_resource(&self) -> Option<&Resource<RI, AI>> {
        self.selected.first().and_then(|id| self.resource(*id))
    }

    pub fn selected_resource_keys(&self) -> Vec<RI> {
        self.selected_resources()
            .into_iter()
            .map(|r| r.key().clone())
            .collect()
    }

    pub fn is_selected_resource(&self, id: ResourceId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_multi_select(&self) -> bool {
        self.multi_select
    }

    pub fn set_multi_select(&mut self, multi_select: bool) {
        self.multi_select = multi_select;
    }

    pub fn select_resource(&mut self, id: ResourceId) {
        self.select_resources(&[id]);
    }

    /// Select the given resources.
    ///
    /// Unknown ids are skipped. Without multi-select only the first resource
    /// is kept. A selection equal to the current one (in any order) fires nothing.
    pub fn select_resources(&mut self, ids: &[ResourceId]) {
        let mut seen = HashSet::new();
        let mut selection: Vec<ResourceId> = ids
            .iter()
            .copied()
            .filter(|id| self.resource(*id).is_some() && seen.insert(*id))
            .collect();
        if selection.len() > 1 && !self.multi_select {
            selection.truncate(1);
        }

        let current: HashSet<ResourceId> = self.selected.iter().copied().collect();
        if selection.len() == current.len() && selection.iter().all(|id| current.contains(id)) {
            trace!("selection unchanged");
            return;
        }

        self.batch(|planner| {
            planner.selected = selection;
            let snapshots = planner.selected_resources().into_iter().cloned().collect();
            planner.fire(PlannerEvent::from_parts(
                PlannerEventType::ResourcesSelected,
                snapshots,
            ));
        });
    }

    /// Remove resources from the selection. Returns `true` if it changed.
    pub fn deselect_resources(&mut self, ids: &[ResourceId]) -> bool {
        let remaining: Vec<ResourceId> = self
            .selected
            .iter()
            .copied()
            .filter(|id| !ids.contains(id))
            .collect();
        if remaining.len() == self.selected.len() {
            return false;
        }
        self.select_resources(&remaining);
        true
    }

    pub fn deselect_all_resources(&mut self) {
        self.select_resources(&[]);
    }

    // -------------------------------------------------------------------------
    // Changing scope
    // -------------------------------------------------------------------------

    pub fn is_planner_changing(&self) -> bool {
        self.changing > 0
    }

    /// Open (`true`) or close (`false`) a changing scope.
    ///
    /// Scopes nest; buffered events are published when the outermost scope
    /// closes. Closing without an open scope is ignored.
    pub fn set_planner_changing(&mut self, changing: bool) {
        if changing {
            self.changing += 1;
            return;
        }
        match self.changing {
            0 => trace!("no changing scope open"),
            1 => {
                self.changing = 0;
                self.process_event_buffer();
            }
            _ => self.changing -= 1,
        }
    }

    /// Run `f` inside a changing scope.
    pub fn batch<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        self.set_planner_changing(true);
        let result = f(self);
        self.set_planner_changing(false);
        result
    }

    /// Number of events waiting for the outermost scope to close.
    pub fn buffered_event_count(&self) -> usize {
        self.buffer.len()
    }

    fn fire(&mut self, event: PlannerEvent<Resource<RI, AI>>) {
        if self.is_planner_changing() {
            self.buffer.add(event);
        } else {
            self.bus.publish(event);
        }
    }

    fn process_event_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let events = if self.coalesce_events {
            self.buffer.consume_and_coalesce_events()
        } else {
            self.buffer.consume_events()
        };
        let count = events.len();
        let receivers = self.bus.publish_batch(events);
        debug!(events = count, receivers, "published planner event batch");
    }
}

impl<RI, AI> Default for Planner<RI, AI>
where
    RI: Clone + PartialEq,
    AI: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<RI, AI> std::fmt::Debug for Planner<RI, AI> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("resources", &self.resources.len())
            .field("selected", &self.selected.len())
            .field("changing", &self.changing)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
