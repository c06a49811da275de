//! Edge source boundary and in-memory implementation
//!
//! The system of record for groups, roles and permissions lives outside this
//! crate. [`EdgeSource`] is the only thing the index needs from it.

use crate::error::{AuthzError, Result};
use crate::types::{EdgeSnapshot, GroupRoleEdge, NamespaceId, RolePermissionEdge};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read access to the relational group/role/permission graph
#[async_trait]
pub trait EdgeSource: Send + Sync {
    /// List every namespace that should have an index
    async fn list_namespaces(&self) -> Result<Vec<NamespaceId>>;

    /// List group → role edges of a namespace
    async fn list_group_role_edges(&self, namespace: &str) -> Result<Vec<GroupRoleEdge>>;

    /// List role → permission edges of a namespace
    async fn list_role_permission_edges(&self, namespace: &str) -> Result<Vec<RolePermissionEdge>>;

    /// Read both edge lists of a namespace
    async fn snapshot(&self, namespace: &str) -> Result<EdgeSnapshot> {
        let group_roles = self.list_group_role_edges(namespace).await?;
        let role_permissions = self.list_role_permission_edges(namespace).await?;

        Ok(EdgeSnapshot {
            namespace: namespace.to_string(),
            group_roles,
            role_permissions,
        })
    }
}

/// Edges of one namespace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NamespaceEdges {
    #[serde(default)]
    group_roles: HashSet<GroupRoleEdge>,

    #[serde(default)]
    role_permissions: HashSet<RolePermissionEdge>,
}

/// JSON edge fixture: `{ "namespaces": { "<ns>": { ... } } }`
#[derive(Debug, Default, Serialize, Deserialize)]
struct EdgeFixture {
    #[serde(default)]
    namespaces: BTreeMap<NamespaceId, NamespaceEdges>,
}

/// In-memory edge source
///
/// A snapshot is taken under a single read lock, so it never mixes two
/// versions of a namespace.
pub struct InMemoryEdgeSource {
    namespaces: Arc<RwLock<BTreeMap<NamespaceId, NamespaceEdges>>>,
}

impl InMemoryEdgeSource {
    /// Create an empty edge source
    pub fn new() -> Self {
        Self {
            namespaces: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Load edges from a JSON fixture file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load edges from a JSON fixture string
    pub fn from_json(contents: &str) -> Result<Self> {
        let fixture: EdgeFixture = serde_json::from_str(contents)?;
        Ok(Self {
            namespaces: Arc::new(RwLock::new(fixture.namespaces)),
        })
    }

    /// Register a namespace with no edges (no-op if it exists)
    pub async fn add_namespace(&self, namespace: impl Into<NamespaceId>) {
        let mut namespaces = self.namespaces.write().await;
        namespaces.entry(namespace.into()).or_default();
    }

    /// Remove a namespace and all its edges
    pub async fn remove_namespace(&self, namespace: &str) -> bool {
        let mut namespaces = self.namespaces.write().await;
        namespaces.remove(namespace).is_some()
    }

    /// Grant a role to a group, creating the namespace if needed
    pub async fn grant_role(&self, namespace: &str, group_id: &str, role_id: &str) {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .group_roles
            .insert(GroupRoleEdge::new(group_id, role_id));
    }

    /// Revoke a role from a group
    pub async fn revoke_role(&self, namespace: &str, group_id: &str, role_id: &str) -> bool {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .get_mut(namespace)
            .map(|edges| edges.group_roles.remove(&GroupRoleEdge::new(group_id, role_id)))
            .unwrap_or(false)
    }

    /// Grant a permission to a role, creating the namespace if needed
    pub async fn grant_permission(&self, namespace: &str, role_id: &str, permission_id: &str) {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .role_permissions
            .insert(RolePermissionEdge::new(role_id, permission_id));
    }

    /// Revoke a permission from a role
    pub async fn revoke_permission(&self, namespace: &str, role_id: &str, permission_id: &str) -> bool {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .get_mut(namespace)
            .map(|edges| {
                edges
                    .role_permissions
                    .remove(&RolePermissionEdge::new(role_id, permission_id))
            })
            .unwrap_or(false)
    }

    async fn edges_of(&self, namespace: &str) -> Result<NamespaceEdges> {
        let namespaces = self.namespaces.read().await;
        namespaces
            .get(namespace)
            .cloned()
            .ok_or_else(|| AuthzError::EdgeSource(format!("unknown namespace '{}'", namespace)))
    }
}

impl Default for InMemoryEdgeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EdgeSource for InMemoryEdgeSource {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceId>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.keys().cloned().collect())
    }

    async fn list_group_role_edges(&self, namespace: &str) -> Result<Vec<GroupRoleEdge>> {
        let edges = self.edges_of(namespace).await?;
        Ok(edges.group_roles.into_iter().collect())
    }

    async fn list_role_permission_edges(&self, namespace: &str) -> Result<Vec<RolePermissionEdge>> {
        let edges = self.edges_of(namespace).await?;
        Ok(edges.role_permissions.into_iter().collect())
    }

    async fn snapshot(&self, namespace: &str) -> Result<EdgeSnapshot> {
        let edges = self.edges_of(namespace).await?;

        Ok(EdgeSnapshot {
            namespace: namespace.to_string(),
            group_roles: edges.group_roles.into_iter().collect(),
            role_permissions: edges.role_permissions.into_iter().collect(),
        })
    }
}
