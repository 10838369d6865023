//! Report pipeline
//!
//! Lists nodes and pods, fetches live usage node by node, builds the
//! resource stat tree and hands the finished tree to a renderer. The tree is
//! rebuilt from scratch on every call.


use crate::models::{LiveUsageSnapshot, NodeDescriptor, PodDescriptor, PodKey};
use crate::observability::ReportLogger;
use crate::quantity::ResourceSet;
use crate::rate::{derive_rates, NetworkRates};
use crate::source::{DeclaredResourceSource, LiveUsageSource, SourceError};
use crate::stat::{ExclusionPolicy, ResourceStat};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Knobs for building a report
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub exclusion: ExclusionPolicy,
    /// Restrict pods to one namespace
    pub namespace: Option<String>,
    pub logger: ReportLogger,
}

impl ReportOptions {
    pub fn new(exclusion: ExclusionPolicy) -> Self {
        Self {
            exclusion,
            namespace: None,
            logger: ReportLogger::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_logger(mut self, logger: ReportLogger) -> Self {
        self.logger = logger;
        self
    }
}

/// Network rate of a pod that has a live usage sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PodRates {
    Measured(NetworkRates),
    Undefined { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PodReport {
    pub pod: PodDescriptor,
    pub stat: ResourceStat,
    /// In an excluded namespace, so not counted in the node totals
    pub excluded: bool,
    /// `None` when kubelet had no sample for the pod
    pub rates: Option<PodRates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: NodeDescriptor,
    pub stat: ResourceStat,
    pub pods: Vec<PodReport>,
    /// Whole-node usage reported by kubelet, when it could be fetched
    pub kubelet_used: Option<ResourceSet>,
}

impl NodeReport {
    pub fn usage_available(&self) -> bool {
        self.kubelet_used.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub generated_at: DateTime<Utc>,
    pub nodes: Vec<NodeReport>,
    pub cluster: ResourceStat,
}

/// Consumer of a finished report
pub trait ReportRenderer {
    fn render_node(&mut self, node: &NodeReport);

    /// Called once, after every node
    fn render_cluster(&mut self, cluster: &ResourceStat);
}

impl ClusterReport {
    pub fn render<R: ReportRenderer + ?Sized>(&self, renderer: &mut R) {
        for node in &self.nodes {
            renderer.render_node(node);
        }
        renderer.render_cluster(&self.cluster);
    }
}

/// Build the report for one node from its pods and, if available, its
/// kubelet snapshot. Pods that only kubelet knows about are reported with
/// their usage and no declared resources.
pub fn build_node_report(
    node: NodeDescriptor,
    mut pods: Vec<PodDescriptor>,
    snapshot: Option<&LiveUsageSnapshot>,
    options: &ReportOptions,
    now: DateTime<Utc>,
) -> NodeReport {
    if let Some(snapshot) = snapshot {
        let declared: BTreeSet<PodKey> = pods.iter().map(PodDescriptor::key).collect();
        let live_only: Vec<PodDescriptor> = snapshot
            .pods
            .keys()
            .filter(|key| !declared.contains(*key))
            .filter(|key| {
                options
                    .namespace
                    .as_deref()
                    .map_or(true, |ns| key.namespace == ns)
            })
            .map(|key| {
                options.logger.log_pod_undeclared(&node.name, key);
                PodDescriptor {
                    namespace: key.namespace.clone(),
                    name: key.name.clone(),
                    node_name: Some(node.name.clone()),
                    containers: Vec::new(),
                }
            })
            .collect();
        pods.extend(live_only);
    }
    pods.sort_by_key(PodDescriptor::key);

    let pods: Vec<PodReport> = pods
        .into_iter()
        .map(|pod| {
            let declared = ResourceStat::for_pod(&pod);
            let excluded = options.exclusion.excludes(&pod);
            let key = pod.key();

            match snapshot.and_then(|s| s.sample(&key)) {
                Some(sample) => {
                    let rates = match derive_rates(sample, now) {
                        Ok(rates) => PodRates::Measured(rates),
                        Err(e) => {
                            options.logger.log_rate_undefined(&node.name, &key, &e);
                            PodRates::Undefined {
                                reason: e.to_string(),
                            }
                        }
                    };
                    PodReport {
                        stat: declared.with_used(&sample.used()),
                        pod,
                        excluded,
                        rates: Some(rates),
                    }
                }
                None => PodReport {
                    pod,
                    stat: declared,
                    excluded,
                    rates: None,
                },
            }
        })
        .collect();

    let stat = ResourceStat::for_node(
        &node,
        pods.iter().filter(|p| !p.excluded).map(|p| &p.stat),
    );

    NodeReport {
        node,
        stat,
        pods,
        kubelet_used: snapshot.map(|s| s.node_used.clone()),
    }
}

/// Build the full report
///
/// Failing to list nodes or pods is fatal. A node whose live usage cannot be
/// fetched is still reported, with empty `used` and no rates.
pub async fn build_report<D, U>(
    declared: &D,
    usage: &U,
    options: &ReportOptions,
    now: DateTime<Utc>,
) -> Result<ClusterReport, SourceError>
where
    D: DeclaredResourceSource + ?Sized,
    U: LiveUsageSource + ?Sized,
{
    let pods = declared.list_pods(options.namespace.as_deref()).await?;
    let mut nodes = declared.list_nodes().await?;
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    let known: BTreeSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    let mut pods_by_node: BTreeMap<String, Vec<PodDescriptor>> = BTreeMap::new();
    for pod in pods {
        match pod.node_name.as_deref() {
            Some(node) if known.contains(node) => {
                pods_by_node.entry(node.to_string()).or_default().push(pod);
            }
            other => options.logger.log_pod_unscheduled(&pod.key(), other),
        }
    }

    let mut reports = Vec::with_capacity(nodes.len());
    for node in nodes {
        let snapshot = match usage.fetch_node_usage(&node.name).await {
            Ok(snapshot) => Some(snapshot),
            Err(reason) => {
                options
                    .logger
                    .log_node_usage_unavailable(&node.name, &reason);
                None
            }
        };
        let pods = pods_by_node.remove(&node.name).unwrap_or_default();
        reports.push(build_node_report(
            node,
            pods,
            snapshot.as_ref(),
            options,
            now,
        ));
    }

    let cluster = ResourceStat::for_cluster(reports.iter().map(|r| &r.stat));
    let pod_count = reports.iter().map(|r| r.pods.len()).sum();
    let without_usage = reports.iter().filter(|r| !r.usage_available()).count();
    options
        .logger
        .log_report_built(reports.len(), pod_count, without_usage);

    Ok(ClusterReport {
        generated_at: now,
        nodes: reports,
        cluster,
    })
}
