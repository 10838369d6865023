//! Core data models for the usage report

use crate::quantity::{ResourceSet, CPU, MEMORY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label carrying the cloud instance type of a node
pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";

/// GKE label telling standard from spot/preemptible provisioning
pub const GKE_PROVISIONING_LABEL: &str = "cloud.google.com/gke-provisioning";

/// Identity of a pod across both data sources
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Declared requests and limits of one container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResources {
    pub name: String,
    pub requests: ResourceSet,
    pub limits: ResourceSet,
}

/// A pod as declared in the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodDescriptor {
    pub namespace: String,
    pub name: String,
    /// `None` while the pod is not yet scheduled
    pub node_name: Option<String>,
    pub containers: Vec<ContainerResources>,
}

impl PodDescriptor {
    pub fn key(&self) -> PodKey {
        PodKey::new(&self.namespace, &self.name)
    }
}

/// A node taint, rendered as `key=value:Effect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub value: Option<String>,
    pub effect: String,
}

impl fmt::Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}:{}", self.key, value, self.effect),
            None => write!(f, "{}:{}", self.key, self.effect),
        }
    }
}

/// A node as declared in the control plane
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub allocatable: ResourceSet,
    pub capacity: ResourceSet,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
}

impl NodeDescriptor {
    pub fn instance_type(&self) -> Option<&str> {
        self.labels.get(INSTANCE_TYPE_LABEL).map(String::as_str)
    }

    pub fn provisioning(&self) -> Option<&str> {
        self.labels.get(GKE_PROVISIONING_LABEL).map(String::as_str)
    }
}

/// Live usage of one pod as reported by kubelet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveUsageSample {
    pub pod: PodKey,
    /// `None` when kubelet has no start time for the pod
    pub start_time: Option<DateTime<Utc>>,
    /// Instantaneous CPU usage
    pub cpu_nano_cores: u64,
    /// Instantaneous memory usage
    pub memory_bytes: u64,
    /// Cumulative since pod start
    pub rx_bytes: u64,
    /// Cumulative since pod start
    pub tx_bytes: u64,
}

impl LiveUsageSample {
    /// CPU and memory usage as a resource set, ready to merge into `Used`
    pub fn used(&self) -> ResourceSet {
        ResourceSet::new()
            .with(CPU, self.cpu_nano_cores)
            .with(MEMORY, self.memory_bytes)
    }
}

/// Usage of one node from a single kubelet stats fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveUsageSnapshot {
    pub node_name: String,
    /// Whole-node CPU and memory usage as seen by kubelet
    pub node_used: ResourceSet,
    pub pods: BTreeMap<PodKey, LiveUsageSample>,
}

impl LiveUsageSnapshot {
    pub fn sample(&self, key: &PodKey) -> Option<&LiveUsageSample> {
        self.pods.get(key)
    }
}
