//! Immutable per-namespace policy index
//!
//! A [`PolicyIndex`] flattens the group → role → permission graph of one
//! namespace into a group → permission-set map. It is built once from an
//! [`EdgeSnapshot`] and never mutated afterwards; a rebuild produces a new
//! index that replaces the old one.
//!
//! # Example
//!
//! ```rust
//! use iam_authz::{GroupRoleEdge, PolicyIndex, RolePermissionEdge};
//!
//! let index = PolicyIndex::build(
//!     "acme",
//!     vec![GroupRoleEdge::new("engineering", "developer")],
//!     vec![RolePermissionEdge::new("developer", "repo:write")],
//! );
//!
//! assert!(index.check_access("engineering", "repo:write"));
//! assert!(!index.check_access("engineering", "repo:admin"));
//! assert!(!index.check_access("sales", "repo:write"));
//! ```

use crate::types::{EdgeSnapshot, GroupId, GroupRoleEdge, NamespaceId, PermissionId, RoleId, RolePermissionEdge};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Counts captured when an index is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Groups present in the index
    pub groups: usize,

    /// Distinct roles seen in either edge list
    pub roles: usize,

    /// Distinct permissions reachable by at least one group
    pub permissions: usize,

    /// Group → role edges consumed (after deduplication)
    pub group_role_edges: usize,

    /// Role → permission edges consumed (after deduplication)
    pub role_permission_edges: usize,
}

/// Group → permission-set lookup for one namespace
#[derive(Debug, Clone)]
pub struct PolicyIndex {
    namespace: NamespaceId,
    grants: HashMap<GroupId, HashSet<PermissionId>>,
    generation: u64,
    built_at: DateTime<Utc>,
    stats: IndexStats,
}

impl PolicyIndex {
    /// Build an index from the edges of one namespace
    ///
    /// Edge order and duplicates do not affect the result. A role with no
    /// recorded permissions contributes nothing, but groups holding it are
    /// still present with an empty set.
    pub fn build<G, P>(namespace: impl Into<NamespaceId>, group_roles: G, role_permissions: P) -> Self
    where
        G: IntoIterator<Item = GroupRoleEdge>,
        P: IntoIterator<Item = RolePermissionEdge>,
    {
        let mut role_edges: HashSet<RolePermissionEdge> = HashSet::new();
        let mut role_permissions_map: HashMap<RoleId, HashSet<PermissionId>> = HashMap::new();
        for edge in role_permissions {
            if role_edges.insert(edge.clone()) {
                role_permissions_map
                    .entry(edge.role_id)
                    .or_default()
                    .insert(edge.permission_id);
            }
        }

        let mut group_edges: HashSet<GroupRoleEdge> = HashSet::new();
        let mut roles: HashSet<&RoleId> = role_permissions_map.keys().collect();
        let mut group_role_list: Vec<GroupRoleEdge> = Vec::new();
        for edge in group_roles {
            if group_edges.insert(edge.clone()) {
                group_role_list.push(edge);
            }
        }

        let mut grants: HashMap<GroupId, HashSet<PermissionId>> = HashMap::new();
        for edge in &group_role_list {
            roles.insert(&edge.role_id);
            let permissions = grants.entry(edge.group_id.clone()).or_default();
            if let Some(role_permissions) = role_permissions_map.get(&edge.role_id) {
                permissions.extend(role_permissions.iter().cloned());
            }
        }

        let permissions: HashSet<&PermissionId> = grants.values().flatten().collect();
        let stats = IndexStats {
            groups: grants.len(),
            roles: roles.len(),
            permissions: permissions.len(),
            group_role_edges: group_edges.len(),
            role_permission_edges: role_edges.len(),
        };

        Self {
            namespace: namespace.into(),
            grants,
            generation: 0,
            built_at: Utc::now(),
            stats,
        }
    }

    /// Build an index from a snapshot
    pub fn from_snapshot(snapshot: EdgeSnapshot) -> Self {
        Self::build(snapshot.namespace, snapshot.group_roles, snapshot.role_permissions)
    }

    /// Stamp the build generation (done once, before publishing)
    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Whether `group_id` holds `permission_id`
    ///
    /// Unknown groups and missing permissions are both `false`.
    pub fn check_access(&self, group_id: &str, permission_id: &str) -> bool {
        self.grants
            .get(group_id)
            .map(|permissions| permissions.contains(permission_id))
            .unwrap_or(false)
    }

    /// Permission set of a group, `None` if the group holds no role here
    pub fn permissions_for(&self, group_id: &str) -> Option<&HashSet<PermissionId>> {
        self.grants.get(group_id)
    }

    /// Groups present in the index
    pub fn groups(&self) -> impl Iterator<Item = &GroupId> {
        self.grants.keys()
    }

    /// Namespace this index belongs to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Build generation (0 until published by the manager)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Build timestamp
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Whether two indexes grant exactly the same permissions
    pub fn same_grants(&self, other: &PolicyIndex) -> bool {
        self.namespace == other.namespace && self.grants == other.grants
    }
}
