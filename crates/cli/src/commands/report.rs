//! `show` and `node` commands

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use usage_lib::{
    build_report, ClusterReport, DeclaredResourceSource, DisabledUsageSource, LiveUsageSource,
    NodeDescriptor, PodDescriptor, ReportLogger, ReportOptions, SourceError,
};

use super::Context;
use crate::client::{connect, KubeDeclaredSource, KubeletStatsClient};
use crate::config::{ReportSettings, Settings, UsageMode};
use crate::output::{print_info, print_warning, OutputFormat, TableRenderer};
use crate::ReportArgs;

/// Restricts a declared source to one node
struct SingleNode<'a, S: ?Sized> {
    inner: &'a S,
    name: &'a str,
}

#[async_trait]
impl<'a, S> DeclaredResourceSource for SingleNode<'a, S>
where
    S: DeclaredResourceSource + ?Sized,
{
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, SourceError> {
        let nodes = self.inner.list_nodes().await?;
        Ok(nodes.into_iter().filter(|n| n.name == self.name).collect())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<PodDescriptor>, SourceError> {
        self.inner.list_pods(namespace).await
    }
}

/// Build the report and print it
pub async fn run(ctx: &Context, args: &ReportArgs, only_node: Option<&str>) -> Result<()> {
    let settings = Settings::load(ctx.config.as_deref())?;
    let format = match ctx.format {
        Some(format) => format,
        None => settings.output_format()?,
    };
    let resolved = settings.resolve(args)?;

    let client = connect(ctx.kubeconfig.as_deref(), ctx.context.as_deref()).await?;
    let logger = ReportLogger::for_cluster(ctx.context.as_deref().unwrap_or("current-context"));
    let declared = KubeDeclaredSource::new(client, logger.clone());
    let usage = usage_source(&resolved)?;

    let options = ReportOptions::new(resolved.exclusion.clone())
        .with_namespace(resolved.namespace.clone())
        .with_logger(logger);

    let report = match only_node {
        Some(name) => {
            let single = SingleNode {
                inner: &declared,
                name,
            };
            let report = generate(&single, usage.as_ref(), &options).await?;
            if report.nodes.is_empty() {
                bail!("Node '{}' not found", name);
            }
            report
        }
        None => generate(&declared, usage.as_ref(), &options).await?,
    };

    if report.nodes.iter().any(|n| !n.usage_available()) {
        if resolved.usage == UsageMode::Disabled {
            print_info("Live usage is off; start `kubectl proxy` and pass --proxy-port to enable it");
        } else {
            print_warning("Live usage could not be fetched for some nodes; run with -v for details");
        }
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            let mut renderer = TableRenderer::new(resolved.show_excluded);
            report.render(&mut renderer);
            print!("{}", renderer.finish());
        }
    }

    Ok(())
}

async fn generate<D: DeclaredResourceSource + ?Sized>(
    declared: &D,
    usage: &dyn LiveUsageSource,
    options: &ReportOptions,
) -> Result<ClusterReport> {
    build_report(declared, usage, options, Utc::now())
        .await
        .context("Failed to list cluster resources")
}

fn usage_source(settings: &ReportSettings) -> Result<Box<dyn LiveUsageSource>> {
    match &settings.usage {
        UsageMode::Proxy(base_url) => {
            info!(proxy = %base_url, "Fetching live usage through API proxy");
            Ok(Box::new(KubeletStatsClient::new(
                base_url.clone(),
                settings.fetch_timeout,
            )?))
        }
        UsageMode::Disabled => Ok(Box::new(DisabledUsageSource)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usage_lib::source::StaticDeclaredSource;

    fn node(name: &str) -> NodeDescriptor {
        NodeDescriptor {
            name: name.to_string(),
            ..NodeDescriptor::default()
        }
    }

    #[tokio::test]
    async fn test_single_node_filters_nodes_only() {
        let pod = PodDescriptor {
            namespace: "default".to_string(),
            name: "web".to_string(),
            node_name: Some("node-b".to_string()),
            containers: Vec::new(),
        };
        let declared = StaticDeclaredSource::new(vec![node("node-a"), node("node-b")], vec![pod]);
        let single = SingleNode {
            inner: &declared,
            name: "node-b",
        };

        let nodes = single.list_nodes().await.unwrap();
        let pods = single.list_pods(None).await.unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "node-b");
        assert_eq!(pods.len(), 1);
    }

    #[tokio::test]
    async fn test_report_for_missing_node_is_empty() {
        let declared = StaticDeclaredSource::new(vec![node("node-a")], Vec::new());
        let single = SingleNode {
            inner: &declared,
            name: "node-z",
        };
        let options = ReportOptions::new(usage_lib::ExclusionPolicy::none());

        let report = generate(&single, &DisabledUsageSource, &options).await.unwrap();

        assert!(report.nodes.is_empty());
    }
}
