//! Structured logging for report events
//!
//! Non-fatal conditions never reach the rendered report as errors; they are
//! logged here with consistent fields and show up as empty cells.

use crate::models::PodKey;
use crate::quantity::QuantityError;
use crate::rate::RateError;
use crate::source::UsageUnavailable;
use tracing::{debug, info, warn};

/// Structured logger for report events
#[derive(Clone, Debug, Default)]
pub struct ReportLogger {
    cluster: Option<String>,
}

impl ReportLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every event with a cluster or context name
    pub fn for_cluster(cluster: impl Into<String>) -> Self {
        Self {
            cluster: Some(cluster.into()),
        }
    }

    fn cluster(&self) -> &str {
        self.cluster.as_deref().unwrap_or("")
    }

    /// Live usage for a node is missing; the node is reported without it
    pub fn log_node_usage_unavailable(&self, node: &str, reason: &UsageUnavailable) {
        match reason {
            UsageUnavailable::Disabled => {
                debug!(
                    event = "node_usage_unavailable",
                    cluster = %self.cluster(),
                    node = %node,
                    reason = %reason,
                    "Live usage disabled"
                );
            }
            _ => {
                warn!(
                    event = "node_usage_unavailable",
                    cluster = %self.cluster(),
                    node = %node,
                    reason = %reason,
                    "Live usage unavailable, reporting declared resources only"
                );
            }
        }
    }

    /// A pod's network rate could not be derived
    pub fn log_rate_undefined(&self, node: &str, pod: &PodKey, reason: &RateError) {
        info!(
            event = "rate_undefined",
            cluster = %self.cluster(),
            node = %node,
            pod = %pod,
            reason = %reason,
            "Network rate undefined"
        );
    }

    /// A pod has no node yet, or its node is not in the node list
    pub fn log_pod_unscheduled(&self, pod: &PodKey, node: Option<&str>) {
        debug!(
            event = "pod_unscheduled",
            cluster = %self.cluster(),
            pod = %pod,
            node = ?node,
            "Pod not placed on a listed node, skipping"
        );
    }

    /// Kubelet reports a pod the API server did not list
    pub fn log_pod_undeclared(&self, node: &str, pod: &PodKey) {
        debug!(
            event = "pod_undeclared",
            cluster = %self.cluster(),
            node = %node,
            pod = %pod,
            "Pod only known to kubelet, reporting usage without declared resources"
        );
    }

    /// A declared quantity could not be parsed and was dropped
    pub fn log_quantity_rejected(&self, object: &str, resource: &str, error: &QuantityError) {
        warn!(
            event = "quantity_rejected",
            cluster = %self.cluster(),
            object = %object,
            resource = %resource,
            error = %error,
            "Ignoring unparsable resource quantity"
        );
    }

    /// The report tree is complete
    pub fn log_report_built(&self, nodes: usize, pods: usize, nodes_without_usage: usize) {
        info!(
            event = "report_built",
            cluster = %self.cluster(),
            nodes = nodes,
            pods = pods,
            nodes_without_usage = nodes_without_usage,
            "Usage report built"
        );
    }
}
