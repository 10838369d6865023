//! Cluster clients: the Kubernetes API for declared resources and the
//! kubelet stats endpoint (through an API proxy) for live usage

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use reqwest::Client as HttpClient;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;
use usage_lib::summary::Summary;
use usage_lib::{
    ContainerResources, DeclaredResourceSource, LiveUsageSnapshot, LiveUsageSource,
    NodeDescriptor, PodDescriptor, ReportLogger, ResourceSet, SourceError, Taint,
    UsageUnavailable,
};

/// Connect to the cluster from an explicit kubeconfig, a named context, or
/// the inferred configuration (`KUBECONFIG`, `~/.kube/config`, in-cluster)
pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Client> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..KubeConfigOptions::default()
    };

    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .context("Failed to load kubeconfig")?
        }
        None if context.is_some() => Config::from_kubeconfig(&options)
            .await
            .context("Failed to load kubeconfig context")?,
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes config")?,
    };

    Client::try_from(config).context("Failed to create Kubernetes client")
}

fn source_error(error: kube::Error) -> SourceError {
    match error {
        kube::Error::Api(response) => {
            SourceError::Api(format!("{} (HTTP {})", response.message, response.code))
        }
        other => SourceError::Connection(other.to_string()),
    }
}

/// Declared nodes and pods from the Kubernetes API
pub struct KubeDeclaredSource {
    client: Client,
    logger: ReportLogger,
}

impl KubeDeclaredSource {
    pub fn new(client: Client, logger: ReportLogger) -> Self {
        Self { client, logger }
    }
}

#[async_trait]
impl DeclaredResourceSource for KubeDeclaredSource {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, SourceError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(source_error)?;

        Ok(list
            .items
            .iter()
            .map(|node| node_descriptor(node, &self.logger))
            .collect())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<PodDescriptor>, SourceError> {
        let pods: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = pods
            .list(&ListParams::default())
            .await
            .map_err(source_error)?;

        Ok(list
            .items
            .iter()
            .map(|pod| pod_descriptor(pod, &self.logger))
            .collect())
    }
}

/// Parse a quantity map, logging and dropping entries that do not parse
fn resource_set(
    object: &str,
    quantities: Option<&BTreeMap<String, Quantity>>,
    logger: &ReportLogger,
) -> ResourceSet {
    let Some(quantities) = quantities else {
        return ResourceSet::new();
    };

    let (set, rejected) = ResourceSet::parse_list(
        quantities
            .iter()
            .map(|(name, quantity)| (name.as_str(), quantity.0.as_str())),
    );
    for (resource, error) in &rejected {
        logger.log_quantity_rejected(object, resource, error);
    }
    set
}

pub fn node_descriptor(node: &Node, logger: &ReportLogger) -> NodeDescriptor {
    let name = node.metadata.name.clone().unwrap_or_default();
    let status = node.status.as_ref();

    let taints = node
        .spec
        .as_ref()
        .and_then(|spec| spec.taints.as_ref())
        .map(|taints| {
            taints
                .iter()
                .map(|t| Taint {
                    key: t.key.clone(),
                    value: t.value.clone(),
                    effect: t.effect.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    NodeDescriptor {
        allocatable: resource_set(
            &name,
            status.and_then(|s| s.allocatable.as_ref()),
            logger,
        ),
        capacity: resource_set(&name, status.and_then(|s| s.capacity.as_ref()), logger),
        labels: node.metadata.labels.clone().unwrap_or_default(),
        taints,
        name,
    }
}

pub fn pod_descriptor(pod: &Pod, logger: &ReportLogger) -> PodDescriptor {
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();
    let name = pod.metadata.name.clone().unwrap_or_default();
    let spec = pod.spec.as_ref();

    let containers = spec
        .map(|spec| {
            spec.containers
                .iter()
                .map(|container| {
                    let object = format!("{}/{}/{}", namespace, name, container.name);
                    let resources = container.resources.as_ref();
                    ContainerResources {
                        name: container.name.clone(),
                        requests: resource_set(
                            &object,
                            resources.and_then(|r| r.requests.as_ref()),
                            logger,
                        ),
                        limits: resource_set(
                            &object,
                            resources.and_then(|r| r.limits.as_ref()),
                            logger,
                        ),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    PodDescriptor {
        node_name: spec.and_then(|s| s.node_name.clone()),
        namespace,
        name,
        containers,
    }
}

/// Kubelet `stats/summary` client going through an API proxy such as
/// `kubectl proxy`
pub struct KubeletStatsClient {
    client: HttpClient,
    base_url: Url,
}

impl KubeletStatsClient {
    /// Create a client for the proxy at `base_url`
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    fn summary_url(&self, node_name: &str) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&format!("api/v1/nodes/{}/proxy/stats/summary", node_name))
    }
}

#[async_trait]
impl LiveUsageSource for KubeletStatsClient {
    async fn fetch_node_usage(
        &self,
        node_name: &str,
    ) -> Result<LiveUsageSnapshot, UsageUnavailable> {
        let url = self
            .summary_url(node_name)
            .map_err(|e| UsageUnavailable::Transport(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UsageUnavailable::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UsageUnavailable::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UsageUnavailable::Transport(e.to_string()))?;

        let summary =
            Summary::from_slice(&body).map_err(|e| UsageUnavailable::Malformed(e.to_string()))?;
        Ok(summary.into_snapshot(node_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use usage_lib::{PodKey, CPU, MEMORY};

    const MI: u64 = 1024 * 1024;

    fn logger() -> ReportLogger {
        ReportLogger::new()
    }

    #[test]
    fn test_pod_descriptor_from_spec() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": {"name": "web-1", "namespace": "default"},
            "spec": {
                "nodeName": "node-a",
                "containers": [
                    {"name": "app", "resources": {
                        "requests": {"cpu": "100m", "memory": "128Mi"},
                        "limits": {"cpu": "1", "memory": "256Mi"}
                    }},
                    {"name": "sidecar", "resources": {"requests": {"cpu": "200m", "memory": "256Mi"}}},
                    {"name": "bare"}
                ]
            }
        }))
        .unwrap();

        let descriptor = pod_descriptor(&pod, &logger());

        assert_eq!(descriptor.key(), PodKey::new("default", "web-1"));
        assert_eq!(descriptor.node_name.as_deref(), Some("node-a"));
        assert_eq!(descriptor.containers.len(), 3);
        assert_eq!(descriptor.containers[0].requests.get(CPU), 100_000_000);
        assert_eq!(descriptor.containers[0].limits.get(MEMORY), 256 * MI);
        assert!(descriptor.containers[1].limits.is_empty());
        assert!(descriptor.containers[2].requests.is_empty());
    }

    #[test]
    fn test_unparsable_quantity_is_dropped() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": {"name": "odd", "namespace": "default"},
            "spec": {"containers": [
                {"name": "app", "resources": {"requests": {"cpu": "lots", "memory": "64Mi"}}}
            ]}
        }))
        .unwrap();

        let descriptor = pod_descriptor(&pod, &logger());

        assert_eq!(descriptor.node_name, None);
        assert_eq!(descriptor.containers[0].requests.cpu(), 0);
        assert_eq!(descriptor.containers[0].requests.memory(), 64 * MI);
    }

    #[test]
    fn test_node_descriptor_from_status() {
        let node: Node = serde_json::from_value(json!({
            "metadata": {
                "name": "node-a",
                "labels": {"node.kubernetes.io/instance-type": "e2-standard-4"}
            },
            "spec": {"taints": [
                {"key": "dedicated", "value": "gpu", "effect": "NoSchedule"},
                {"key": "spot", "effect": "PreferNoSchedule"}
            ]},
            "status": {
                "allocatable": {"cpu": "3920m", "memory": "13Gi", "pods": "110"},
                "capacity": {"cpu": "4", "memory": "16Gi", "pods": "110"}
            }
        }))
        .unwrap();

        let descriptor = node_descriptor(&node, &logger());

        assert_eq!(descriptor.name, "node-a");
        assert_eq!(descriptor.instance_type(), Some("e2-standard-4"));
        assert_eq!(descriptor.allocatable.cpu(), 3_920_000_000);
        assert_eq!(descriptor.capacity.memory(), 16 * 1024 * MI);
        assert_eq!(descriptor.capacity.get("pods"), 110);
        let taints: Vec<String> = descriptor.taints.iter().map(ToString::to_string).collect();
        assert_eq!(taints, vec!["dedicated=gpu:NoSchedule", "spot:PreferNoSchedule"]);
    }

    #[test]
    fn test_node_without_status() {
        let node: Node = serde_json::from_value(json!({"metadata": {"name": "bare"}})).unwrap();

        let descriptor = node_descriptor(&node, &logger());

        assert!(descriptor.capacity.is_empty());
        assert!(descriptor.taints.is_empty());
    }

    const SUMMARY: &str = r#"{
      "node": {"nodeName": "node-a", "cpu": {"usageNanoCores": 500000000}, "memory": {"usageBytes": 1073741824}},
      "pods": [{
        "podRef": {"name": "web-1", "namespace": "default", "uid": "1"},
        "startTime": "2024-03-01T11:59:50Z",
        "cpu": {"usageNanoCores": 25000000},
        "memory": {"usageBytes": 52428800},
        "network": {"rxBytes": 4000, "txBytes": 8000}
      }]
    }"#;

    fn stats_client(server: &mockito::Server) -> KubeletStatsClient {
        let base = Url::parse(&format!("{}/", server.url())).unwrap();
        KubeletStatsClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_node_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/nodes/node-a/proxy/stats/summary")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SUMMARY)
            .create_async()
            .await;

        let snapshot = stats_client(&server)
            .fetch_node_usage("node-a")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.node_name, "node-a");
        assert_eq!(snapshot.node_used.cpu(), 500_000_000);
        let web = snapshot.sample(&PodKey::new("default", "web-1")).unwrap();
        assert_eq!(web.cpu_nano_cores, 25_000_000);
        assert_eq!(web.rx_bytes, 4000);
    }

    #[tokio::test]
    async fn test_fetch_node_usage_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/nodes/node-b/proxy/stats/summary")
            .with_status(503)
            .with_body("no endpoints available")
            .create_async()
            .await;

        let result = stats_client(&server).fetch_node_usage("node-b").await;

        assert_eq!(result.unwrap_err(), UsageUnavailable::Status(503));
    }

    #[tokio::test]
    async fn test_fetch_node_usage_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/nodes/node-c/proxy/stats/summary")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let result = stats_client(&server).fetch_node_usage("node-c").await;

        assert!(matches!(result, Err(UsageUnavailable::Malformed(_))));
    }

    #[tokio::test]
    async fn test_fetch_node_usage_unreachable() {
        let base = Url::parse("http://127.0.0.1:1/").unwrap();
        let client = KubeletStatsClient::new(base, Duration::from_secs(1)).unwrap();

        let result = client.fetch_node_usage("node-a").await;

        assert!(matches!(result, Err(UsageUnavailable::Transport(_))));
    }
}
