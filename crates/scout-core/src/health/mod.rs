//! Concurrency-safe capability health map.

mod reconcile;
pub use reconcile::Reconciler;

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use parking_lot::RwLock;
use scout_model::CapabilityStatus;
use tracing::trace;

use crate::events::{EventBus, WorkerEvent};

/// In-memory capability health state.
///
/// Entries are created by the first [`HealthTracker::update_status`] for a
/// name and never removed. Clones share the same map.
#[derive(Clone, Default)]
pub struct HealthTracker {
    inner: Arc<RwLock<HashMap<String, CapabilityStatus>>>,
    events: EventBus,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Record the outcome of a check.
    ///
    /// `is_healthy` and `last_checked` are always overwritten. With an
    /// error, `last_error` is replaced and `error_count` grows only when
    /// unhealthy; without one, both are cleared.
    pub fn update_status(&self, name: &str, healthy: bool, error: Option<&str>) {
        let (previous, status) = {
            let mut inner = self.inner.write();
            let previous = inner.get(name).map(|s| s.is_healthy);
            let status = inner
                .entry(name.to_string())
                .or_insert_with(|| CapabilityStatus::new(name));

            status.is_healthy = healthy;
            status.last_checked = SystemTime::now();
            match error {
                Some(err) => {
                    status.last_error = Some(err.to_string());
                    if !healthy {
                        status.error_count = status.error_count.saturating_add(1);
                    }
                }
                None => {
                    status.last_error = None;
                    status.error_count = 0;
                }
            }
            (previous, status.clone())
        };

        trace!(capability = name, healthy, error_count = status.error_count, "capability status updated");
        self.events.publish(WorkerEvent::CapabilityChecked {
            capability: status.name.clone(),
            healthy,
            error_count: status.error_count,
            error: status.last_error.clone(),
        });
        match (previous, healthy) {
            (Some(false), true) => self.events.publish(WorkerEvent::CapabilityRecovered {
                capability: status.name,
            }),
            (None | Some(true), false) => self.events.publish(WorkerEvent::CapabilityDegraded {
                capability: status.name,
                error: status.last_error,
            }),
            _ => {}
        }
    }

    /// Copy of the status for one capability.
    pub fn get_status(&self, name: &str) -> Option<CapabilityStatus> {
        self.inner.read().get(name).cloned()
    }

    /// Owned copy of every status; mutations on it never reach the tracker.
    pub fn get_all_statuses(&self) -> HashMap<String, CapabilityStatus> {
        self.inner.read().clone()
    }

    /// Statuses currently recorded unhealthy.
    pub fn unhealthy(&self) -> Vec<CapabilityStatus> {
        self.inner
            .read()
            .values()
            .filter(|s| !s.is_healthy)
            .cloned()
            .collect()
    }

    /// `true` only for capabilities that have been checked and found unhealthy.
    pub fn is_unhealthy(&self, name: &str) -> bool {
        self.inner
            .read()
            .get(name)
            .is_some_and(|s| !s.is_healthy)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
