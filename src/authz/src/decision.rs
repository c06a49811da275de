//! Access decision API
//!
//! Answers "does any of these groups hold this permission in this
//! namespace?" against the currently published index. A decision is a pure
//! read: it never triggers a build and never waits for one.

use crate::error::{AuthzError, Result};
use crate::index::PolicyIndex;
use crate::manager::PolicyIndexManager;
use crate::types::{GroupId, NamespaceId, PermissionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Why a decision came out the way it did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionReason {
    /// This group holds the permission
    GroupGranted { group: GroupId },

    /// None of the candidate groups holds the permission
    NoGroupGranted,
}

/// Access decision with audit metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Unique decision identifier
    pub id: String,

    /// Whether access is allowed
    pub allowed: bool,

    /// Namespace the decision was made in
    pub namespace: NamespaceId,

    /// Permission that was checked
    pub permission: PermissionId,

    /// First candidate group holding the permission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_group: Option<GroupId>,

    /// Generation of the index that answered
    pub generation: u64,

    /// Reason for the decision
    pub reason: DecisionReason,

    /// Decision timestamp (milliseconds since epoch)
    pub timestamp: i64,
}

impl AccessDecision {
    fn new(
        index: &PolicyIndex,
        permission: &str,
        matched_group: Option<GroupId>,
    ) -> Self {
        let reason = match &matched_group {
            Some(group) => DecisionReason::GroupGranted { group: group.clone() },
            None => DecisionReason::NoGroupGranted,
        };

        Self {
            id: Uuid::new_v4().to_string(),
            allowed: matched_group.is_some(),
            namespace: index.namespace().to_string(),
            permission: permission.to_string(),
            matched_group,
            generation: index.generation(),
            reason,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Consumer-facing access checks over a [`PolicyIndexManager`]
#[derive(Clone)]
pub struct AccessDecider {
    manager: Arc<PolicyIndexManager>,
}

impl AccessDecider {
    pub fn new(manager: Arc<PolicyIndexManager>) -> Self {
        Self { manager }
    }

    /// Whether any of `group_ids` holds `permission` in `namespace`
    ///
    /// # Errors
    ///
    /// - [`AuthzError::NamespaceNotFound`] if the namespace has no published
    ///   index. Callers must treat this as a deny, not as "no restrictions".
    /// - [`AuthzError::InvalidInput`] if `group_ids` is empty.
    pub fn check_access<G: AsRef<str>>(
        &self,
        namespace: &str,
        group_ids: &[G],
        permission: &str,
    ) -> Result<bool> {
        let index = self.lookup(namespace, group_ids)?;
        let allowed = first_granted(&index, group_ids, permission).is_some();

        self.manager.metrics_collector().record_decision(allowed);
        debug!(
            namespace = %namespace,
            permission = %permission,
            groups = group_ids.len(),
            allowed,
            "Access check"
        );

        Ok(allowed)
    }

    /// Same as [`check_access`](Self::check_access), with audit metadata
    pub fn decide<G: AsRef<str>>(
        &self,
        namespace: &str,
        group_ids: &[G],
        permission: &str,
    ) -> Result<AccessDecision> {
        let index = self.lookup(namespace, group_ids)?;
        let matched = first_granted(&index, group_ids, permission).map(str::to_string);
        let decision = AccessDecision::new(&index, permission, matched);

        self.manager.metrics_collector().record_decision(decision.allowed);
        debug!(
            namespace = %namespace,
            permission = %permission,
            generation = decision.generation,
            matched_group = ?decision.matched_group,
            "Access decision"
        );

        Ok(decision)
    }

    fn lookup<G: AsRef<str>>(&self, namespace: &str, group_ids: &[G]) -> Result<Arc<PolicyIndex>> {
        if group_ids.is_empty() {
            return Err(AuthzError::InvalidInput(
                "at least one candidate group is required".to_string(),
            ));
        }

        self.manager.get(namespace).map_err(|e| {
            self.manager.metrics_collector().record_namespace_not_found();
            e
        })
    }
}

/// First group, in caller order, that holds `permission`
fn first_granted<'a, G: AsRef<str>>(
    index: &PolicyIndex,
    group_ids: &'a [G],
    permission: &str,
) -> Option<&'a str> {
    group_ids
        .iter()
        .map(|group| group.as_ref())
        .find(|group| index.check_access(group, permission))
}
