//! Shared per-namespace bookkeeping
//!
//! Owned behind an `Arc` so rebuilds can run on detached tasks and still
//! publish after the caller that asked for them has gone away.

use super::metrics::MetricsCollector;
use super::state::{NamespaceState, NamespaceStatus};
use crate::index::PolicyIndex;
use crate::types::NamespaceId;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct IndexRegistry {
    /// Currently published index per namespace
    published: DashMap<NamespaceId, Arc<PolicyIndex>>,

    /// Serializes rebuilds of the same namespace
    rebuild_locks: DashMap<NamespaceId, Arc<Mutex<()>>>,

    /// Lifecycle state per namespace
    statuses: DashMap<NamespaceId, NamespaceStatus>,

    pub(crate) metrics: MetricsCollector,
}

impl IndexRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, namespace: &str) -> Option<Arc<PolicyIndex>> {
        self.published.get(namespace).map(|index| Arc::clone(index.value()))
    }

    pub(crate) fn publish(&self, namespace: NamespaceId, index: Arc<PolicyIndex>) {
        self.published.insert(namespace, index);
    }

    /// Generation of the published index, 0 if none
    pub(crate) fn generation(&self, namespace: &str) -> u64 {
        self.published
            .get(namespace)
            .map(|current| current.generation())
            .unwrap_or(0)
    }

    pub(crate) fn namespaces(&self) -> Vec<NamespaceId> {
        let mut namespaces: Vec<NamespaceId> =
            self.published.iter().map(|entry| entry.key().clone()).collect();
        namespaces.sort();
        namespaces
    }

    pub(crate) fn status(&self, namespace: &str) -> Option<NamespaceStatus> {
        self.statuses.get(namespace).map(|status| status.value().clone())
    }

    pub(crate) fn statuses(&self) -> Vec<NamespaceStatus> {
        let mut statuses: Vec<NamespaceStatus> =
            self.statuses.iter().map(|entry| entry.value().clone()).collect();
        statuses.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        statuses
    }

    pub(crate) fn update_status(&self, namespace: &str, update: impl FnOnce(&mut NamespaceStatus)) {
        let mut status = self
            .statuses
            .entry(namespace.to_string())
            .or_insert_with(|| NamespaceStatus::new(namespace));
        update(status.value_mut());
    }

    pub(crate) fn rebuild_lock(&self, namespace: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.rebuild_locks.get(namespace) {
            return Arc::clone(lock.value());
        }

        let lock = self
            .rebuild_locks
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(lock.value())
    }

    /// Drop the status and rebuild lock of a namespace that has no index
    ///
    /// Must be called while holding that namespace's rebuild guard. The lock
    /// is only removed when nobody else is waiting on it.
    pub(crate) fn forget_unpublished(&self, namespace: &str) {
        if self.published.contains_key(namespace) {
            return;
        }

        self.statuses.remove(namespace);
        // One reference in the map, one held by the caller's guard
        self.rebuild_locks
            .remove_if(namespace, |_, lock| Arc::strong_count(lock) <= 2);
    }

    /// Builds cut short by a fatal startup failure never left `Uninitialized`
    pub(crate) fn reset_unfinished_builds(&self) {
        for mut entry in self.statuses.iter_mut() {
            if entry.state == NamespaceState::Building {
                entry.state = NamespaceState::Uninitialized;
            }
        }
    }

    pub(crate) fn tracked_namespaces(&self) -> (usize, usize) {
        (self.statuses.len(), self.rebuild_locks.len())
    }
}
