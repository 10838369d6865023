//! Resource stat tree
//!
//! A [`ResourceStat`] exists for every pod, node and the cluster. Each level
//! is the field-wise merge of the level below it, except capacity and
//! allocatable: those come straight from the node and are only summed from
//! nodes into the cluster.

use crate::models::{NodeDescriptor, PodDescriptor};
use crate::quantity::ResourceSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Namespace excluded from node totals unless configured otherwise
pub const DEFAULT_EXCLUDED_NAMESPACE: &str = "kube-system";

/// Capacity, allocatable, used, requested and limit at one level of the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStat {
    pub capacity: ResourceSet,
    pub allocatable: ResourceSet,
    pub used: ResourceSet,
    pub requested: ResourceSet,
    pub limit: ResourceSet,
}

impl ResourceStat {
    /// Field-wise merge of all five sets
    pub fn merge(&self, other: &ResourceStat) -> ResourceStat {
        ResourceStat {
            capacity: self.capacity.merge(&other.capacity),
            allocatable: self.allocatable.merge(&other.allocatable),
            used: self.used.merge(&other.used),
            requested: self.requested.merge(&other.requested),
            limit: self.limit.merge(&other.limit),
        }
    }

    /// Requests and limits of a pod, summed over its containers
    ///
    /// A container without requests or limits contributes nothing to that
    /// field. `used` stays empty until live usage is merged in.
    pub fn for_pod(pod: &PodDescriptor) -> ResourceStat {
        ResourceStat {
            requested: ResourceSet::sum(pod.containers.iter().map(|c| &c.requests)),
            limit: ResourceSet::sum(pod.containers.iter().map(|c| &c.limits)),
            ..ResourceStat::default()
        }
    }

    /// Copy of this stat with `used` merged in
    pub fn with_used(&self, used: &ResourceSet) -> ResourceStat {
        ResourceStat {
            used: self.used.merge(used),
            ..self.clone()
        }
    }

    /// Node stat from its descriptor and the stats of the pods counted
    /// towards it. Pod capacity and allocatable are ignored.
    pub fn for_node<'a>(
        node: &NodeDescriptor,
        pods: impl IntoIterator<Item = &'a ResourceStat>,
    ) -> ResourceStat {
        let workload = pods
            .into_iter()
            .fold(ResourceStat::default(), |total, pod| {
                total.merge(&ResourceStat {
                    capacity: ResourceSet::new(),
                    allocatable: ResourceSet::new(),
                    ..pod.clone()
                })
            });

        ResourceStat {
            capacity: node.capacity.clone(),
            allocatable: node.allocatable.clone(),
            ..workload
        }
    }

    /// Cluster stat: merge of every node stat, all five fields
    pub fn for_cluster<'a>(nodes: impl IntoIterator<Item = &'a ResourceStat>) -> ResourceStat {
        nodes
            .into_iter()
            .fold(ResourceStat::default(), |total, node| total.merge(node))
    }
}

/// Namespaces whose pods are left out of node totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionPolicy {
    namespaces: BTreeSet<String>,
}

impl ExclusionPolicy {
    /// Exclude nothing
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excludes(&self, pod: &PodDescriptor) -> bool {
        self.namespaces.contains(&pod.namespace)
    }
}
