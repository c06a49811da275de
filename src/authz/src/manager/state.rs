//! Per-namespace lifecycle tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one namespace
///
/// ```text
/// Uninitialized → Building → Ready | FatalFailed      (startup)
/// Ready → Rebuilding → Ready                          (runtime, success or failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceState {
    Uninitialized,
    Building,
    Ready,
    Rebuilding,
    FatalFailed,
}

impl NamespaceState {
    /// Whether a published index may exist in this state
    pub fn is_servable(&self) -> bool {
        matches!(self, NamespaceState::Ready | NamespaceState::Rebuilding)
    }
}

/// Status report for one namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceStatus {
    /// Namespace identifier
    pub namespace: String,

    /// Current lifecycle state
    pub state: NamespaceState,

    /// Generation of the published index (0 if none)
    pub generation: u64,

    /// When the published index was built
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_built_at: Option<DateTime<Utc>>,

    /// Duration of the last successful build
    pub last_build_ms: u64,

    /// Most recent build error, cleared by the next success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// When the most recent build error happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failed_at: Option<DateTime<Utc>>,

    /// Failed builds since the last success
    pub consecutive_failures: u32,
}

impl NamespaceStatus {
    pub(crate) fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            state: NamespaceState::Uninitialized,
            generation: 0,
            last_built_at: None,
            last_build_ms: 0,
            last_error: None,
            last_failed_at: None,
            consecutive_failures: 0,
        }
    }

    /// Enter `Building` (no index yet) or `Rebuilding` (index published)
    pub(crate) fn begin_build(&mut self) {
        self.state = if self.state.is_servable() {
            NamespaceState::Rebuilding
        } else {
            NamespaceState::Building
        };
    }

    pub(crate) fn record_success(&mut self, generation: u64, built_at: DateTime<Utc>, elapsed_ms: u64) {
        self.state = NamespaceState::Ready;
        self.generation = generation;
        self.last_built_at = Some(built_at);
        self.last_build_ms = elapsed_ms;
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    /// Record a failed build; a servable namespace goes back to `Ready`
    pub(crate) fn record_failure(&mut self, error: String, fatal: bool) {
        self.state = match self.state {
            NamespaceState::Rebuilding => NamespaceState::Ready,
            _ if fatal => NamespaceState::FatalFailed,
            _ => NamespaceState::Uninitialized,
        };
        self.last_error = Some(error);
        self.last_failed_at = Some(Utc::now());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}
