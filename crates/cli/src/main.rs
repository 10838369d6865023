//! kube-usage CLI
//!
//! Reports declared requests and limits next to live kubelet usage, per
//! pod, per node and for the whole cluster.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Kubernetes resource usage versus allocation
#[derive(Parser)]
#[command(name = "kube-usage")]
#[command(author, version, about = "Kubernetes resource usage versus allocation", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses KUBECONFIG or ~/.kube/config if not specified)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Path to the config file (defaults to ~/.config/kube-usage/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show usage for every node and the cluster
    Show(ReportArgs),

    /// Show usage for a single node
    Node {
        /// Node name
        name: String,

        #[command(flatten)]
        report: ReportArgs,
    },
}

/// Options shared by the report commands
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Local port of a running `kubectl proxy`, enables live usage
    #[arg(long)]
    pub proxy_port: Option<u16>,

    /// Base URL of an API proxy, enables live usage (overrides --proxy-port)
    #[arg(long)]
    pub proxy_url: Option<String>,

    /// Only report pods from this namespace
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Namespace left out of node totals, repeatable (defaults to kube-system)
    #[arg(long)]
    pub exclude_namespace: Vec<String>,

    /// Count pods from every namespace
    #[arg(long, conflicts_with = "exclude_namespace")]
    pub no_exclude: bool,

    /// List pods from excluded namespaces in the node tables
    #[arg(long)]
    pub show_excluded: bool,

    /// Timeout in seconds for each kubelet stats request
    #[arg(long)]
    pub timeout: Option<u64>,
}

fn init_tracing(verbosity: u8, json: bool) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let ctx = commands::Context {
        kubeconfig: cli.kubeconfig,
        context: cli.context,
        config: cli.config,
        format: cli.format,
    };

    match cli.command {
        Commands::Show(args) => {
            commands::report::run(&ctx, &args, None).await?;
        }
        Commands::Node { name, report } => {
            commands::report::run(&ctx, &report, Some(&name)).await?;
        }
    }

    Ok(())
}
