//! # IAM Authorization Policy Index
//!
//! In-memory, per-namespace index of the group → role → permission graph,
//! used to answer access checks on the request hot path.
//!
//! ## Features
//!
//! - **Immutable indexes** built once from an edge snapshot, replaced atomically
//! - **Parallel startup** with a bounded build pool and fail-fast semantics
//! - **Per-namespace reloads** that never block readers or other namespaces
//! - **Default deny**: unknown namespaces and failed builds never grant access
//! - **Invalidation channel** for instances sharing one system of record
//!
//! ## Example
//!
//! ```rust
//! use iam_authz::{AccessDecider, IndexConfig, InMemoryEdgeSource, PolicyIndexManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(InMemoryEdgeSource::new());
//!     source.grant_role("acme", "engineering", "developer").await;
//!     source.grant_permission("acme", "developer", "repo:write").await;
//!
//!     let manager = Arc::new(PolicyIndexManager::new(source.clone(), IndexConfig::default()));
//!     manager.initialize().await?;
//!
//!     let decider = AccessDecider::new(manager.clone());
//!     assert!(decider.check_access("acme", &["engineering"], "repo:write")?);
//!
//!     // After committing a graph change, rebuild the namespace
//!     source.grant_role("acme", "support", "developer").await;
//!     manager.reload("acme").await?;
//!     assert!(decider.check_access("acme", &["support"], "repo:write")?);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decision;
pub mod error;
pub mod index;
pub mod invalidation;
pub mod manager;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use types::{
    EdgeSnapshot, GroupId, GroupRoleEdge, NamespaceId, PermissionId, RoleId,
    RolePermissionEdge,
};
pub use config::IndexConfig;
pub use decision::{AccessDecider, AccessDecision, DecisionReason};
pub use error::{AuthzError, Result};
pub use index::{IndexStats, PolicyIndex};
pub use invalidation::{spawn_listener, InvalidationBus, InvalidationMessage};
pub use manager::{IndexMetrics, NamespaceState, NamespaceStatus, PolicyIndexManager};
pub use source::{EdgeSource, InMemoryEdgeSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
