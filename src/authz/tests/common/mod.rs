//! Shared test utilities: a fault-injecting edge source

#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashMap;
use iam_authz::{
    AuthzError, EdgeSnapshot, EdgeSource, GroupRoleEdge, InMemoryEdgeSource, NamespaceId,
    Result, RolePermissionEdge,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Edge source that can fail or stall selected namespaces on demand
pub struct ScriptedEdgeSource {
    inner: InMemoryEdgeSource,
    failing: DashMap<NamespaceId, String>,
    panicking: DashMap<NamespaceId, String>,
    delays: DashMap<NamespaceId, Duration>,
    fail_listing: AtomicBool,
    snapshots: AtomicUsize,
    in_flight: DashMap<NamespaceId, usize>,
    max_in_flight: DashMap<NamespaceId, usize>,
    in_flight_total: AtomicUsize,
    max_in_flight_total: AtomicUsize,
}

impl ScriptedEdgeSource {
    pub fn new() -> Self {
        Self {
            inner: InMemoryEdgeSource::new(),
            failing: DashMap::new(),
            panicking: DashMap::new(),
            delays: DashMap::new(),
            fail_listing: AtomicBool::new(false),
            snapshots: AtomicUsize::new(0),
            in_flight: DashMap::new(),
            max_in_flight: DashMap::new(),
            in_flight_total: AtomicUsize::new(0),
            max_in_flight_total: AtomicUsize::new(0),
        }
    }

    pub fn edges(&self) -> &InMemoryEdgeSource {
        &self.inner
    }

    /// Make every snapshot of `namespace` fail
    pub fn fail(&self, namespace: &str, reason: &str) {
        self.failing.insert(namespace.to_string(), reason.to_string());
    }

    /// Make every snapshot of `namespace` panic
    pub fn panic_on(&self, namespace: &str, message: &str) {
        self.panicking.insert(namespace.to_string(), message.to_string());
    }

    /// Clear failures and panics for `namespace`
    pub fn heal(&self, namespace: &str) {
        self.failing.remove(namespace);
        self.panicking.remove(namespace);
    }

    /// Delay every snapshot of `namespace`
    pub fn delay(&self, namespace: &str, delay: Duration) {
        self.delays.insert(namespace.to_string(), delay);
    }

    pub fn clear_delay(&self, namespace: &str) {
        self.delays.remove(namespace);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Snapshots started so far
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent snapshots seen for `namespace`
    pub fn max_concurrent_snapshots(&self, namespace: &str) -> usize {
        self.max_in_flight.get(namespace).map(|v| *v).unwrap_or(0)
    }

    /// Highest number of concurrent snapshots seen across all namespaces
    pub fn max_concurrent_snapshots_total(&self) -> usize {
        self.max_in_flight_total.load(Ordering::SeqCst)
    }

    fn enter(&self, namespace: &str) {
        let total = self.in_flight_total.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_total.fetch_max(total, Ordering::SeqCst);

        let current = {
            let mut entry = self.in_flight.entry(namespace.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        let mut max = self.max_in_flight.entry(namespace.to_string()).or_insert(0);
        if current > *max {
            *max = current;
        }
    }

    fn exit(&self, namespace: &str) {
        self.in_flight_total.fetch_sub(1, Ordering::SeqCst);
        if let Some(mut entry) = self.in_flight.get_mut(namespace) {
            *entry -= 1;
        }
    }
}

#[async_trait]
impl EdgeSource for ScriptedEdgeSource {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceId>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(AuthzError::EdgeSource("namespace listing unavailable".to_string()));
        }
        self.inner.list_namespaces().await
    }

    async fn list_group_role_edges(&self, namespace: &str) -> Result<Vec<GroupRoleEdge>> {
        self.inner.list_group_role_edges(namespace).await
    }

    async fn list_role_permission_edges(&self, namespace: &str) -> Result<Vec<RolePermissionEdge>> {
        self.inner.list_role_permission_edges(namespace).await
    }

    async fn snapshot(&self, namespace: &str) -> Result<EdgeSnapshot> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);

        let panic_message = self.panicking.get(namespace).map(|m| m.clone());
        if let Some(message) = panic_message {
            panic!("{}", message);
        }

        self.enter(namespace);

        let delay = self.delays.get(namespace).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failing.get(namespace).map(|r| r.clone());
        let result = match failure {
            Some(reason) => Err(AuthzError::EdgeSource(reason)),
            None => self.inner.snapshot(namespace).await,
        };

        self.exit(namespace);
        result
    }
}

/// Scripted source seeded with the same graph in every namespace given
pub async fn seeded_source(namespaces: &[&str]) -> Arc<ScriptedEdgeSource> {
    let source = Arc::new(ScriptedEdgeSource::new());
    for namespace in namespaces {
        source.edges().grant_role(namespace, "g1", "r1").await;
        source.edges().grant_permission(namespace, "r1", "p1").await;
    }
    source
}
