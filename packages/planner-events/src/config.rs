//! Planner configuration from `PLANNER_EVENT_BUS_CAPACITY`,
//! `PLANNER_BACKLOG_WARN_THRESHOLD`, `PLANNER_COALESCE_EVENTS` and
//! `PLANNER_MULTI_SELECT`.

use std::env;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::buffer::DEFAULT_BACKLOG_WARN_THRESHOLD;
use crate::bus::DEFAULT_CAPACITY;

/// Planner event configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Capacity of the notification bus (`PLANNER_EVENT_BUS_CAPACITY`).
    pub bus_capacity: usize,
    /// Backlog size that triggers a warning (`PLANNER_BACKLOG_WARN_THRESHOLD`).
    pub backlog_warn_threshold: usize,
    /// Coalesce buffered events before publishing (`PLANNER_COALESCE_EVENTS`).
    pub coalesce_events: bool,
    /// Allow more than one selected resource (`PLANNER_MULTI_SELECT`).
    pub multi_select: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_CAPACITY,
            backlog_warn_threshold: DEFAULT_BACKLOG_WARN_THRESHOLD,
            coalesce_events: true,
            multi_select: true,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            bus_capacity: parse_or(&lookup, "PLANNER_EVENT_BUS_CAPACITY", defaults.bus_capacity)?,
            backlog_warn_threshold: parse_or(
                &lookup,
                "PLANNER_BACKLOG_WARN_THRESHOLD",
                defaults.backlog_warn_threshold,
            )?,
            coalesce_events: parse_or(&lookup, "PLANNER_COALESCE_EVENTS", defaults.coalesce_events)?,
            multi_select: parse_or(&lookup, "PLANNER_MULTI_SELECT", defaults.multi_select)?,
        })
        .and_then(Self::validate)
    }

    fn validate(self) -> Result<Self> {
        anyhow::ensure!(
            self.bus_capacity > 0,
            "PLANNER_EVENT_BUS_CAPACITY must be greater than zero"
        );
        Ok(self)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid value (got {raw:?})")),
        None => Ok(default),
    }
}
