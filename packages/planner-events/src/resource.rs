//! Identity-based resource model.
//!
//! A [`Resource`] is one row of a planner: a business key, a display
//! [`ResourceCell`] and an ordered list of [`Activity`] entries. Resources are
//! compared by *identity*, never by value. Every resource receives a
//! [`ResourceId`] from a process-wide counter when it is created:
//!
//! - cloning a resource keeps its id (the clone is a snapshot of the same resource)
//! - creating a resource always yields a fresh id, even with identical fields
//!
//! Everything that needs to decide "is this the same resource again?" goes
//! through the [`Identified`] trait.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PlannerError;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity handle of a resource.
///
/// Ids are only handed out by [`ResourceId::next`]; they cannot be built from
/// arbitrary numbers, so two resources share an id only if one is a snapshot
/// of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh identity.
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value (for logging and serialization).
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

/// Anything that carries a resource identity.
///
/// The coalescer is generic over this trait so it never has to look at
/// payloads to decide whether two entries refer to the same resource.
pub trait Identified {
    /// The identity of the resource this value refers to.
    fn identity(&self) -> ResourceId;
}

impl Identified for ResourceId {
    fn identity(&self) -> ResourceId {
        *self
    }
}

/// Display payload of a resource row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCell {
    pub text: Option<String>,
    pub icon_id: Option<String>,
    pub css_class: Option<String>,
    pub tooltip_text: Option<String>,
}

impl ResourceCell {
    /// Create a cell showing the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_icon_id(mut self, icon_id: impl Into<String>) -> Self {
        self.icon_id = Some(icon_id.into());
        self
    }

    pub fn with_css_class(mut self, css_class: impl Into<String>) -> Self {
        self.css_class = Some(css_class.into());
        self
    }

    pub fn with_tooltip_text(mut self, tooltip_text: impl Into<String>) -> Self {
        self.tooltip_text = Some(tooltip_text.into());
        self
    }
}

/// A time span booked on a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity<RI, AI> {
    resource_key: RI,
    key: AI,
    begin_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    text: Option<String>,
    tooltip_text: Option<String>,
    css_class: Option<String>,
    level: f32,
    level_color: Option<String>,
}

impl<RI, AI> Activity<RI, AI> {
    /// Create an activity spanning `[begin_time, end_time]`.
    ///
    /// Fails with [`PlannerError::InvalidActivityRange`] if the activity ends
    /// before it begins.
    pub fn new(
        resource_key: RI,
        key: AI,
        begin_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, PlannerError> {
        if end_time < begin_time {
            return Err(PlannerError::InvalidActivityRange);
        }
        Ok(Self {
            resource_key,
            key,
            begin_time,
            end_time,
            text: None,
            tooltip_text: None,
            css_class: None,
            level: 0.0,
            level_color: None,
        })
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_tooltip_text(mut self, tooltip_text: impl Into<String>) -> Self {
        self.tooltip_text = Some(tooltip_text.into());
        self
    }

    pub fn with_css_class(mut self, css_class: impl Into<String>) -> Self {
        self.css_class = Some(css_class.into());
        self
    }

    /// Set the utilization level, which must lie within `[0.0, 1.0]`.
    pub fn with_level(mut self, level: f32) -> Result<Self, PlannerError> {
        if !(0.0..=1.0).contains(&level) {
            return Err(PlannerError::InvalidLevel { level });
        }
        self.level = level;
        Ok(self)
    }

    pub fn with_level_color(mut self, color: impl Into<String>) -> Self {
        self.level_color = Some(color.into());
        self
    }

    pub fn resource_key(&self) -> &RI {
        &self.resource_key
    }

    pub fn key(&self) -> &AI {
        &self.key
    }

    pub fn begin_time(&self) -> DateTime<Utc> {
        self.begin_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn level_color(&self) -> Option<&str> {
        self.level_color.as_deref()
    }
}

/// One planner row.
///
/// `RI` is the business key of the resource, `AI` the business key of its
/// activities. Neither takes part in identity checks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<RI, AI> {
    id: ResourceId,
    key: RI,
    resource_cell: ResourceCell,
    activities: Vec<Activity<RI, AI>>,
}

impl<RI, AI> Resource<RI, AI> {
    /// Create a new resource with a fresh identity.
    pub fn new(key: RI, cell: ResourceCell) -> Self {
        Self {
            id: ResourceId::next(),
            key,
            resource_cell: cell,
            activities: Vec::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn key(&self) -> &RI {
        &self.key
    }

    pub fn cell(&self) -> &ResourceCell {
        &self.resource_cell
    }

    pub fn cell_mut(&mut self) -> &mut ResourceCell {
        &mut self.resource_cell
    }

    pub fn set_cell(&mut self, cell: ResourceCell) {
        self.resource_cell = cell;
    }

    pub fn activities(&self) -> &[Activity<RI, AI>] {
        &self.activities
    }

    pub fn add_activity(&mut self, activity: Activity<RI, AI>) {
        self.activities.push(activity);
    }

    pub fn set_activities(&mut self, activities: Vec<Activity<RI, AI>>) {
        self.activities = activities;
    }

    pub fn clear_activities(&mut self) {
        self.activities.clear();
    }

    /// Whether both values are snapshots of the same resource.
    pub fn is_same_resource(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<RI, AI> Identified for Resource<RI, AI> {
    fn identity(&self) -> ResourceId {
        self.id
    }
}
