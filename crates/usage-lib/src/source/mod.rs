//! Data sources feeding the report
//!
//! Declared resources come from the control plane and are required: if they
//! cannot be listed there is nothing to report. Live usage comes from each
//! node's kubelet and is best effort.

mod memory;

pub use memory::{StaticDeclaredSource, StaticUsageSource};

use crate::models::{LiveUsageSnapshot, NodeDescriptor, PodDescriptor};
use async_trait::async_trait;
use thiserror::Error;

/// Failure to enumerate nodes or pods; aborts the report
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot reach the cluster: {0}")]
    Connection(String),

    #[error("API request rejected: {0}")]
    Api(String),
}

/// Live usage for a node could not be obtained; only that node degrades
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageUnavailable {
    #[error("live usage collection is disabled")]
    Disabled,

    #[error("stats request failed: {0}")]
    Transport(String),

    #[error("stats endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed stats payload: {0}")]
    Malformed(String),
}

/// Nodes and pods with their declared resources
#[async_trait]
pub trait DeclaredResourceSource: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, SourceError>;

    /// Pods in `namespace`, or in every namespace when `None`
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<PodDescriptor>, SourceError>;
}

/// Per-node live usage snapshots
#[async_trait]
pub trait LiveUsageSource: Send + Sync {
    async fn fetch_node_usage(&self, node_name: &str)
        -> Result<LiveUsageSnapshot, UsageUnavailable>;
}

/// Usage source that never has data, for runs without a stats endpoint
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledUsageSource;

#[async_trait]
impl LiveUsageSource for DisabledUsageSource {
    async fn fetch_node_usage(
        &self,
        _node_name: &str,
    ) -> Result<LiveUsageSnapshot, UsageUnavailable> {
        Err(UsageUnavailable::Disabled)
    }
}
