//! Planner events: immutable records of a single mutation.
//!
//! An event carries a [`PlannerEventType`] and an ordered list of resources.
//! Events are validated when they are built, so the buffer and the coalescer
//! can trust them:
//!
//! - a resource identity appears at most once per event
//! - an all-resources-deleted event carries no resources
//! - numeric type codes outside the enumeration are rejected
//!
//! # Type Codes
//!
//! | Code | Type                   |
//! |------|------------------------|
//! | 100  | resources inserted     |
//! | 101  | resources updated      |
//! | 102  | resources deleted      |
//! | 103  | all resources deleted  |
//! | 104  | *reserved (order changed, unsupported)* |
//! | 105  | resources selected     |

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::PlannerError;
use crate::resource::{Identified, ResourceId};

const TYPE_RESOURCE_ORDER_CHANGED: i32 = 104;

/// The kind of mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlannerEventType {
    ResourcesInserted,
    ResourcesUpdated,
    ResourcesDeleted,
    AllResourcesDeleted,
    ResourcesSelected,
}

impl PlannerEventType {
    /// Numeric type code used by the planner event protocol.
    pub const fn code(self) -> i32 {
        match self {
            PlannerEventType::ResourcesInserted => 100,
            PlannerEventType::ResourcesUpdated => 101,
            PlannerEventType::ResourcesDeleted => 102,
            PlannerEventType::AllResourcesDeleted => 103,
            PlannerEventType::ResourcesSelected => 105,
        }
    }

    /// Types whose events disappear once they no longer reference any resource.
    pub(crate) const fn is_row_mutation(self) -> bool {
        matches!(
            self,
            PlannerEventType::ResourcesInserted
                | PlannerEventType::ResourcesUpdated
                | PlannerEventType::ResourcesDeleted
        )
    }
}

impl TryFrom<i32> for PlannerEventType {
    type Error = PlannerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            100 => Ok(PlannerEventType::ResourcesInserted),
            101 => Ok(PlannerEventType::ResourcesUpdated),
            102 => Ok(PlannerEventType::ResourcesDeleted),
            103 => Ok(PlannerEventType::AllResourcesDeleted),
            105 => Ok(PlannerEventType::ResourcesSelected),
            TYPE_RESOURCE_ORDER_CHANGED => Err(PlannerError::UnsupportedEventType { code }),
            _ => Err(PlannerError::UnknownEventType { code }),
        }
    }
}

impl fmt::Display for PlannerEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerEventType::ResourcesInserted => write!(f, "resources_inserted"),
            PlannerEventType::ResourcesUpdated => write!(f, "resources_updated"),
            PlannerEventType::ResourcesDeleted => write!(f, "resources_deleted"),
            PlannerEventType::AllResourcesDeleted => write!(f, "all_resources_deleted"),
            PlannerEventType::ResourcesSelected => write!(f, "resources_selected"),
        }
    }
}

/// An immutable record of one planner mutation.
///
/// `R` is the resource snapshot type, usually [`crate::Resource`]. Events own
/// their snapshots; nothing that happens to the planner afterwards changes an
/// event that was already built.
#[derive(Debug, Clone, Serialize)]
pub struct PlannerEvent<R> {
    #[serde(rename = "type")]
    event_type: PlannerEventType,
    resources: Vec<R>,
}

impl<R: Identified> PlannerEvent<R> {
    /// Build an event, validating its resource list.
    pub fn new(event_type: PlannerEventType, resources: Vec<R>) -> Result<Self, PlannerError> {
        if event_type == PlannerEventType::AllResourcesDeleted && !resources.is_empty() {
            return Err(PlannerError::ResourcesOnAllDeleted {
                count: resources.len(),
            });
        }

        let mut seen = HashSet::with_capacity(resources.len());
        for resource in &resources {
            let id = resource.identity();
            if !seen.insert(id) {
                return Err(PlannerError::DuplicateResource { id });
            }
        }

        Ok(Self {
            event_type,
            resources,
        })
    }

    /// Build an event from a numeric type code.
    pub fn from_code(code: i32, resources: Vec<R>) -> Result<Self, PlannerError> {
        Self::new(PlannerEventType::try_from(code)?, resources)
    }

    pub fn inserted(resources: Vec<R>) -> Result<Self, PlannerError> {
        Self::new(PlannerEventType::ResourcesInserted, resources)
    }

    pub fn updated(resources: Vec<R>) -> Result<Self, PlannerError> {
        Self::new(PlannerEventType::ResourcesUpdated, resources)
    }

    pub fn deleted(resources: Vec<R>) -> Result<Self, PlannerError> {
        Self::new(PlannerEventType::ResourcesDeleted, resources)
    }

    pub fn selected(resources: Vec<R>) -> Result<Self, PlannerError> {
        Self::new(PlannerEventType::ResourcesSelected, resources)
    }

    /// Check whether the event references the given resource.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.resources.iter().any(|r| r.identity() == id)
    }

    /// Identities of all referenced resources, in event order.
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.resources.iter().map(Identified::identity).collect()
    }
}

impl<R> PlannerEvent<R> {
    /// The all-resources-deleted marker. Always valid.
    pub fn all_deleted() -> Self {
        Self {
            event_type: PlannerEventType::AllResourcesDeleted,
            resources: Vec::new(),
        }
    }

    /// Assemble an event whose resource list is already known to be unique.
    pub(crate) fn from_parts(event_type: PlannerEventType, resources: Vec<R>) -> Self {
        Self {
            event_type,
            resources,
        }
    }

    pub(crate) fn into_parts(self) -> (PlannerEventType, Vec<R>) {
        (self.event_type, self.resources)
    }

    pub fn event_type(&self) -> PlannerEventType {
        self.event_type
    }

    pub fn resources(&self) -> &[R] {
        &self.resources
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn first_resource(&self) -> Option<&R> {
        self.resources.first()
    }

    pub fn into_resources(self) -> Vec<R> {
        self.resources
    }
}
