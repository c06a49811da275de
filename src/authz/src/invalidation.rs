//! Cross-instance invalidation channel
//!
//! Mutation paths call [`PolicyIndexManager::reload`] directly after they
//! commit. When several instances share one system of record, they also
//! publish the namespace on an [`InvalidationBus`]; every instance runs a
//! listener that reloads the named namespace. Delivery is at-most-once, with
//! no ordering and no acknowledgement.

use crate::config::IndexConfig;
use crate::error::{AuthzError, Result};
use crate::manager::PolicyIndexManager;
use crate::types::NamespaceId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Invalidation message: the namespace whose edges changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationMessage {
    pub namespace: NamespaceId,
}

impl InvalidationMessage {
    pub fn new(namespace: impl Into<NamespaceId>) -> Self {
        Self { namespace: namespace.into() }
    }

    /// Wire payload: the raw UTF-8 namespace identifier
    pub fn to_payload(&self) -> Vec<u8> {
        self.namespace.as_bytes().to_vec()
    }

    /// Parse a wire payload
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let namespace = std::str::from_utf8(payload)
            .map_err(|e| AuthzError::InvalidInput(format!("invalidation payload is not UTF-8: {}", e)))?;

        if namespace.is_empty() {
            return Err(AuthzError::InvalidInput("invalidation payload is empty".to_string()));
        }

        Ok(Self::new(namespace))
    }
}

/// In-process broadcast bus for invalidation messages
#[derive(Clone)]
pub struct InvalidationBus {
    channel: String,
    sender: broadcast::Sender<InvalidationMessage>,
}

impl InvalidationBus {
    /// Create a bus with the given channel name and per-subscriber buffer
    pub fn new(channel: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            channel: channel.into(),
            sender,
        }
    }

    /// Create a bus from the `invalidation_*` configuration values
    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.invalidation_channel.clone(), config.invalidation_capacity)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish an invalidation, returning how many subscribers it reached
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, namespace: impl Into<NamespaceId>) -> usize {
        let message = InvalidationMessage::new(namespace);
        debug!(channel = %self.channel, namespace = %message.namespace, "Publishing invalidation");
        self.sender.send(message).unwrap_or(0)
    }

    /// Publish a raw wire payload
    pub fn publish_payload(&self, payload: &[u8]) -> Result<usize> {
        let message = InvalidationMessage::from_payload(payload)?;
        Ok(self.publish(message.namespace))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationMessage> {
        self.sender.subscribe()
    }
}

/// Spawn a task that reloads every namespace named on `receiver`
///
/// Reload failures keep the previous index and are only logged. When the
/// receiver lags (messages were dropped), every namespace is reloaded since
/// the dropped names are unknown. The task ends when the bus is closed.
pub fn spawn_listener(
    manager: Arc<PolicyIndexManager>,
    mut receiver: broadcast::Receiver<InvalidationMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    if let Err(e) = manager.reload(&message.namespace).await {
                        warn!(namespace = %message.namespace, error = %e, "Invalidation reload failed");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Invalidation listener lagged, reloading all namespaces");
                    let failed = manager
                        .reload_all()
                        .await
                        .into_iter()
                        .filter(|(_, result)| result.is_err())
                        .count();
                    if failed > 0 {
                        warn!(failed, "Some namespaces failed to reload after lag");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Invalidation bus closed, listener stopping");
                    break;
                }
            }
        }
    })
}
