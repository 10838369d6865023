//! Sources backed by fixed data, used for offline runs and tests

use super::{DeclaredResourceSource, LiveUsageSource, SourceError, UsageUnavailable};
use crate::models::{LiveUsageSnapshot, NodeDescriptor, PodDescriptor};
use async_trait::async_trait;
use std::collections::HashMap;

/// Declared source returning a fixed node and pod list
#[derive(Debug, Clone, Default)]
pub struct StaticDeclaredSource {
    nodes: Vec<NodeDescriptor>,
    pods: Vec<PodDescriptor>,
    failure: Option<String>,
}

impl StaticDeclaredSource {
    pub fn new(nodes: Vec<NodeDescriptor>, pods: Vec<PodDescriptor>) -> Self {
        Self {
            nodes,
            pods,
            failure: None,
        }
    }

    /// A source whose every listing fails with a connection error
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), SourceError> {
        match &self.failure {
            Some(message) => Err(SourceError::Connection(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeclaredResourceSource for StaticDeclaredSource {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, SourceError> {
        self.check()?;
        Ok(self.nodes.clone())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<PodDescriptor>, SourceError> {
        self.check()?;
        Ok(self
            .pods
            .iter()
            .filter(|pod| namespace.map_or(true, |ns| pod.namespace == ns))
            .cloned()
            .collect())
    }
}

/// Usage source returning a fixed outcome per node
///
/// Nodes without an entry report [`UsageUnavailable::Disabled`].
#[derive(Debug, Clone, Default)]
pub struct StaticUsageSource {
    outcomes: HashMap<String, Result<LiveUsageSnapshot, UsageUnavailable>>,
}

impl StaticUsageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, snapshot: LiveUsageSnapshot) -> Self {
        self.outcomes
            .insert(snapshot.node_name.clone(), Ok(snapshot));
        self
    }

    pub fn with_failure(mut self, node_name: impl Into<String>, error: UsageUnavailable) -> Self {
        self.outcomes.insert(node_name.into(), Err(error));
        self
    }
}

#[async_trait]
impl LiveUsageSource for StaticUsageSource {
    async fn fetch_node_usage(
        &self,
        node_name: &str,
    ) -> Result<LiveUsageSnapshot, UsageUnavailable> {
        self.outcomes
            .get(node_name)
            .cloned()
            .unwrap_or(Err(UsageUnavailable::Disabled))
    }
}
