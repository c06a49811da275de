//! Core policy graph types

use serde::{Deserialize, Serialize};

/// Namespace identifier (isolated policy domain)
pub type NamespaceId = String;

/// Unique group identifier
pub type GroupId = String;

/// Unique role identifier
pub type RoleId = String;

/// Unique permission identifier
pub type PermissionId = String;

/// A group has been granted a role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRoleEdge {
    /// Group holding the role
    pub group_id: GroupId,

    /// Role granted to the group
    pub role_id: RoleId,
}

impl GroupRoleEdge {
    /// Create a new group → role edge
    pub fn new(group_id: impl Into<GroupId>, role_id: impl Into<RoleId>) -> Self {
        Self {
            group_id: group_id.into(),
            role_id: role_id.into(),
        }
    }
}

/// A role grants a permission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RolePermissionEdge {
    /// Role granting the permission
    pub role_id: RoleId,

    /// Permission granted by the role
    pub permission_id: PermissionId,
}

impl RolePermissionEdge {
    /// Create a new role → permission edge
    pub fn new(role_id: impl Into<RoleId>, permission_id: impl Into<PermissionId>) -> Self {
        Self {
            role_id: role_id.into(),
            permission_id: permission_id.into(),
        }
    }
}

/// One read of both edge lists for a single namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    /// Namespace every edge in this snapshot belongs to
    pub namespace: NamespaceId,

    /// Group → role grants
    #[serde(default)]
    pub group_roles: Vec<GroupRoleEdge>,

    /// Role → permission grants
    #[serde(default)]
    pub role_permissions: Vec<RolePermissionEdge>,
}

impl EdgeSnapshot {
    /// Create an empty snapshot for a namespace
    pub fn new(namespace: impl Into<NamespaceId>) -> Self {
        Self {
            namespace: namespace.into(),
            group_roles: Vec::new(),
            role_permissions: Vec::new(),
        }
    }

    /// Add a group → role edge
    pub fn with_group_role(mut self, group_id: impl Into<GroupId>, role_id: impl Into<RoleId>) -> Self {
        self.group_roles.push(GroupRoleEdge::new(group_id, role_id));
        self
    }

    /// Add a role → permission edge
    pub fn with_role_permission(
        mut self,
        role_id: impl Into<RoleId>,
        permission_id: impl Into<PermissionId>,
    ) -> Self {
        self.role_permissions
            .push(RolePermissionEdge::new(role_id, permission_id));
        self
    }

    /// Total number of edges in the snapshot
    pub fn edge_count(&self) -> usize {
        self.group_roles.len() + self.role_permissions.len()
    }
}
