//! Policy index manager
//!
//! Owns the published index of every namespace, builds all of them at
//! startup and rebuilds single namespaces on demand while readers keep
//! answering from whatever index is currently published.
//!
//! # Architecture
//!
//! ```text
//! EdgeSource ──snapshot──▶ PolicyIndex::build ──Arc──▶ published[namespace]
//!                                   ▲                        │
//!                 rebuild_locks[namespace]          get() clones the Arc
//! ```
//!
//! Publishing is a single map insert of a fully built `Arc<PolicyIndex>`, so
//! a reader sees either the old index or the new one, never a mix.
//!
//! Every build runs on its own spawned task. A panicking edge source is
//! reported as a build failure, and a rebuild whose caller stops waiting
//! still runs to completion and leaves the namespace `Ready`.

pub mod metrics;
mod registry;
pub mod state;

pub use metrics::{IndexMetrics, MetricsCollector};
pub use state::{NamespaceState, NamespaceStatus};

use registry::IndexRegistry;

use crate::config::IndexConfig;
use crate::error::{AuthzError, Result};
use crate::index::PolicyIndex;
use crate::source::EdgeSource;
use crate::types::NamespaceId;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Namespace reported when a startup failure is not tied to one namespace
const ALL_NAMESPACES: &str = "*";

/// Owns and publishes the per-namespace policy indexes
pub struct PolicyIndexManager {
    /// Edge source (system of record boundary)
    source: Arc<dyn EdgeSource>,

    /// Manager configuration
    config: IndexConfig,

    /// Published indexes, rebuild locks, statuses and counters
    registry: Arc<IndexRegistry>,

    /// Serializes `initialize` calls
    init_lock: Mutex<()>,

    /// Set once every namespace has been published at startup
    ready: AtomicBool,
}

impl PolicyIndexManager {
    /// Create a manager; nothing is built until [`initialize`](Self::initialize)
    pub fn new(source: Arc<dyn EdgeSource>, config: IndexConfig) -> Self {
        Self {
            source,
            config,
            registry: Arc::new(IndexRegistry::new()),
            init_lock: Mutex::new(()),
            ready: AtomicBool::new(false),
        }
    }

    /// Build and publish every namespace listed by the edge source
    ///
    /// Builds run concurrently, at most `max_parallel_builds` at a time, each
    /// bounded by `build_timeout_ms`. Indexes are published only after all of
    /// them succeeded. If any namespace fails, the remaining builds are
    /// aborted, nothing is published and
    /// [`AuthzError::FatalInitialization`] is returned.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let _init = self.init_lock.lock().await;
        if self.is_ready() {
            return Err(AuthzError::AlreadyInitialized);
        }

        let started = Instant::now();
        let namespaces = self.source.list_namespaces().await.map_err(|e| {
            error!(error = %e, "Failed to list namespaces during initialization");
            AuthzError::FatalInitialization {
                namespace: ALL_NAMESPACES.to_string(),
                reason: e.to_string(),
            }
        })?;

        info!(
            namespaces = namespaces.len(),
            max_parallel_builds = self.config.max_parallel_builds,
            "Building policy indexes"
        );

        for namespace in &namespaces {
            self.registry.update_status(namespace, |status| status.begin_build());
        }

        let permits = Arc::new(Semaphore::new(self.config.max_parallel_builds));
        let timeout = self.config.build_timeout();
        let mut builds = JoinSet::new();

        for namespace in namespaces {
            let permits = Arc::clone(&permits);
            let source = Arc::clone(&self.source);

            builds.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        let build_started = Instant::now();
                        build_namespace(source, namespace.clone(), timeout)
                            .await
                            .map(|index| (index, build_started.elapsed()))
                    }
                    Err(_) => Err(AuthzError::BuildFailure {
                        namespace: namespace.clone(),
                        reason: "build pool closed".to_string(),
                    }),
                };
                (namespace, result)
            });
        }

        let mut built = Vec::new();
        while let Some(joined) = builds.join_next().await {
            let (namespace, result) = match joined {
                Ok(output) => output,
                Err(join_error) => {
                    builds.abort_all();
                    self.registry.metrics.record_build_failure(false);
                    self.registry.reset_unfinished_builds();
                    error!(error = %join_error, "Index build task aborted during initialization");
                    return Err(AuthzError::FatalInitialization {
                        namespace: ALL_NAMESPACES.to_string(),
                        reason: format!("build task failed: {}", join_error),
                    });
                }
            };

            match result {
                Ok((index, elapsed)) => {
                    debug!(
                        namespace = %namespace,
                        groups = index.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Namespace index built"
                    );
                    built.push((namespace, index, elapsed));
                }
                Err(e) => {
                    builds.abort_all();
                    self.registry
                        .metrics
                        .record_build_failure(matches!(e, AuthzError::BuildTimeout { .. }));
                    self.registry
                        .update_status(&namespace, |status| status.record_failure(e.to_string(), true));
                    self.registry.reset_unfinished_builds();

                    error!(
                        namespace = %namespace,
                        error = %e,
                        "Namespace failed to build, refusing to serve a partial policy store"
                    );
                    return Err(AuthzError::FatalInitialization {
                        namespace,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let published = built.len();
        for (namespace, index, elapsed) in built {
            let index = Arc::new(index.with_generation(1));
            let built_at = index.built_at();
            self.registry.update_status(&namespace, |status| {
                status.record_success(1, built_at, elapsed.as_millis() as u64)
            });
            self.registry.metrics.record_build_success(elapsed);
            self.registry.publish(namespace, index);
        }

        self.ready.store(true, Ordering::Release);

        info!(
            namespaces = published,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Policy indexes initialized"
        );

        Ok(())
    }

    /// Rebuild one namespace from a fresh snapshot and publish it
    ///
    /// Reloads of the same namespace run one at a time; other namespaces and
    /// readers are never blocked. On failure the previously published index
    /// (if any) keeps serving and [`AuthzError::BuildFailure`] is returned.
    /// A namespace that was never built is published by its first
    /// successful reload; a failed one leaves nothing behind.
    ///
    /// The rebuild runs detached: dropping the returned future does not
    /// cancel it.
    #[instrument(skip(self))]
    pub async fn reload(&self, namespace: &str) -> Result<Arc<PolicyIndex>> {
        if !self.is_ready() {
            return Err(AuthzError::NotInitialized);
        }

        let rebuild = tokio::spawn(
            rebuild_namespace(
                Arc::clone(&self.registry),
                Arc::clone(&self.source),
                namespace.to_string(),
                self.config.build_timeout(),
            )
            .in_current_span(),
        );

        rebuild
            .await
            .unwrap_or_else(|join_error| Err(task_failure(namespace, join_error)))
    }

    /// Reload every published namespace plus any the edge source now lists
    ///
    /// Namespaces are reloaded concurrently; each failure only affects its
    /// own namespace.
    pub async fn reload_all(&self) -> Vec<(NamespaceId, Result<Arc<PolicyIndex>>)> {
        let mut namespaces: BTreeSet<NamespaceId> = self.namespaces().into_iter().collect();
        match self.source.list_namespaces().await {
            Ok(listed) => namespaces.extend(listed),
            Err(e) => warn!(error = %e, "Failed to list namespaces, reloading published ones only"),
        }

        let namespaces: Vec<NamespaceId> = namespaces.into_iter().collect();
        let results = futures::future::join_all(namespaces.iter().map(|ns| self.reload(ns))).await;

        namespaces.into_iter().zip(results).collect()
    }

    /// Currently published index of a namespace
    pub fn get(&self, namespace: &str) -> Result<Arc<PolicyIndex>> {
        self.registry
            .get(namespace)
            .ok_or_else(|| AuthzError::NamespaceNotFound(namespace.to_string()))
    }

    /// Published namespaces, sorted
    pub fn namespaces(&self) -> Vec<NamespaceId> {
        self.registry.namespaces()
    }

    /// Whether startup completed and decisions may be served
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Lifecycle status of one namespace
    pub fn status(&self, namespace: &str) -> Option<NamespaceStatus> {
        self.registry.status(namespace)
    }

    /// Lifecycle status of every known namespace, sorted by namespace
    pub fn statuses(&self) -> Vec<NamespaceStatus> {
        self.registry.statuses()
    }

    pub fn metrics(&self) -> IndexMetrics {
        self.registry.metrics.snapshot()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub(crate) fn metrics_collector(&self) -> &MetricsCollector {
        &self.registry.metrics
    }
}

/// Rebuild one namespace under its rebuild lock and publish the result
///
/// Runs as its own task; the source call runs on a nested task so a panic
/// there is recorded as a failure instead of leaving `Rebuilding` behind.
async fn rebuild_namespace(
    registry: Arc<IndexRegistry>,
    source: Arc<dyn EdgeSource>,
    namespace: NamespaceId,
    timeout: Duration,
) -> Result<Arc<PolicyIndex>> {
    let _rebuild = registry.rebuild_lock(&namespace).lock_owned().await;

    registry.update_status(&namespace, |status| status.begin_build());
    let started = Instant::now();

    let build = tokio::spawn(build_namespace(source, namespace.clone(), timeout));
    let result = build
        .await
        .unwrap_or_else(|join_error| Err(task_failure(&namespace, join_error)));

    match result {
        Ok(index) => {
            let elapsed = started.elapsed();
            let generation = registry.generation(&namespace) + 1;
            let index = Arc::new(index.with_generation(generation));
            let built_at = index.built_at();

            registry.update_status(&namespace, |status| {
                status.record_success(generation, built_at, elapsed.as_millis() as u64)
            });
            registry.publish(namespace.clone(), Arc::clone(&index));
            registry.metrics.record_build_success(elapsed);

            info!(
                namespace = %namespace,
                generation,
                groups = index.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Namespace index reloaded"
            );

            Ok(index)
        }
        Err(e) => {
            registry.update_status(&namespace, |status| status.record_failure(e.to_string(), false));
            registry.forget_unpublished(&namespace);
            registry
                .metrics
                .record_build_failure(matches!(e, AuthzError::BuildTimeout { .. }));

            let retained = registry.get(&namespace).map(|current| current.generation());
            warn!(
                namespace = %namespace,
                error = %e,
                retained_generation = ?retained,
                "Namespace reload failed, keeping previous index"
            );

            Err(AuthzError::BuildFailure {
                namespace,
                reason: e.to_string(),
            })
        }
    }
}

/// Fetch a snapshot and build its index, bounded by `timeout`
async fn build_namespace(
    source: Arc<dyn EdgeSource>,
    namespace: NamespaceId,
    timeout: Duration,
) -> Result<PolicyIndex> {
    let build = async {
        let snapshot = source.snapshot(&namespace).await?;
        if snapshot.namespace != namespace {
            return Err(AuthzError::BuildFailure {
                namespace: namespace.clone(),
                reason: format!("edge source returned snapshot for '{}'", snapshot.namespace),
            });
        }

        Ok(PolicyIndex::from_snapshot(snapshot))
    };

    match tokio::time::timeout(timeout, build).await {
        Ok(result) => result,
        Err(_) => Err(AuthzError::BuildTimeout {
            namespace,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

fn task_failure(namespace: &str, join_error: JoinError) -> AuthzError {
    AuthzError::BuildFailure {
        namespace: namespace.to_string(),
        reason: format!("build task failed: {}", join_error),
    }
}
