//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use std::fmt::Write as _;
use tabled::{settings::Style, Table, Tabled};
use usage_lib::{NodeReport, PodRates, PodReport, ReportRenderer, ResourceSet, ResourceStat};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

const GIB: f64 = (1u64 << 30) as f64;

/// Format nanocores as cores with two decimals
pub fn format_cores(nano_cores: u64) -> String {
    format!("{:.2}", nano_cores as f64 / 1e9)
}

/// Format bytes as GiB with three decimals
pub fn format_gib(bytes: u64) -> String {
    format!("{:.3}", bytes as f64 / GIB)
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

pub fn format_rate(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

/// `part` as a percentage of `whole`, or "-" when `whole` is zero
pub fn format_percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "-".to_string();
    }
    format!("{:.1}%", part as f64 * 100.0 / whole as f64)
}

/// Color a share of allocatable by how close it is to full
fn color_percent(part: u64, whole: u64) -> String {
    let formatted = format_percent(part, whole);
    if whole == 0 {
        return formatted;
    }
    let share = part as f64 / whole as f64;
    if share >= 0.9 {
        formatted.red().to_string()
    } else if share >= 0.7 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Row of a node table
#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "CPU used")]
    cpu_used: String,
    #[tabled(rename = "CPU request")]
    cpu_requested: String,
    #[tabled(rename = "CPU limit")]
    cpu_limit: String,
    #[tabled(rename = "MEM used")]
    mem_used: String,
    #[tabled(rename = "MEM request")]
    mem_requested: String,
    #[tabled(rename = "MEM limit")]
    mem_limit: String,
    #[tabled(rename = "NET RX")]
    net_rx: String,
    #[tabled(rename = "NET TX")]
    net_tx: String,
}

impl PodRow {
    fn for_pod(report: &PodReport) -> Self {
        let stat = &report.stat;
        let (cpu_used, mem_used) = match report.rates {
            Some(_) => (format_cores(stat.used.cpu()), format_gib(stat.used.memory())),
            None => ("-".to_string(), "-".to_string()),
        };
        let (net_rx, net_tx) = match &report.rates {
            Some(PodRates::Measured(rates)) => (
                format_rate(rates.rx_bytes_per_sec),
                format_rate(rates.tx_bytes_per_sec),
            ),
            Some(PodRates::Undefined { .. }) => ("n/a".to_string(), "n/a".to_string()),
            None => ("-".to_string(), "-".to_string()),
        };

        let name = report.pod.key().to_string();
        let pod = if report.excluded {
            format!("{} (excluded)", name).dimmed().to_string()
        } else {
            name.yellow().to_string()
        };

        Self {
            pod,
            cpu_used,
            cpu_requested: format_cores(stat.requested.cpu()),
            cpu_limit: format_cores(stat.limit.cpu()),
            mem_used,
            mem_requested: format_gib(stat.requested.memory()),
            mem_limit: format_gib(stat.limit.memory()),
            net_rx,
            net_tx,
        }
    }

    fn summary(node: &NodeReport) -> Self {
        let stat = &node.stat;
        let (cpu_used, mem_used) = if node.usage_available() {
            (format_cores(stat.used.cpu()), format_gib(stat.used.memory()))
        } else {
            ("-".to_string(), "-".to_string())
        };

        Self {
            pod: "SUMMARY".red().to_string(),
            cpu_used,
            cpu_requested: format_cores(stat.requested.cpu()),
            cpu_limit: format_cores(stat.limit.cpu()),
            mem_used,
            mem_requested: format_gib(stat.requested.memory()),
            mem_limit: format_gib(stat.limit.memory()),
            net_rx: String::new(),
            net_tx: String::new(),
        }
    }

    /// Node-level bound repeated across the used/request/limit columns
    fn bound(label: String, set: &ResourceSet) -> Self {
        let cpu = format_cores(set.cpu());
        let mem = format_gib(set.memory());
        Self {
            pod: label,
            cpu_used: cpu.clone(),
            cpu_requested: cpu.clone(),
            cpu_limit: cpu,
            mem_used: mem.clone(),
            mem_requested: mem.clone(),
            mem_limit: mem,
            net_rx: String::new(),
            net_tx: String::new(),
        }
    }
}

/// Row of the cluster table
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "")]
    label: String,
    #[tabled(rename = "CPU (cores)")]
    cpu: String,
    #[tabled(rename = "CPU %")]
    cpu_percent: String,
    #[tabled(rename = "MEM (GiB)")]
    mem: String,
    #[tabled(rename = "MEM %")]
    mem_percent: String,
}

impl ClusterRow {
    fn new(label: &str, set: &ResourceSet, allocatable: &ResourceSet) -> Self {
        Self {
            label: label.to_string(),
            cpu: format_cores(set.cpu()),
            cpu_percent: color_percent(set.cpu(), allocatable.cpu()),
            mem: format_gib(set.memory()),
            mem_percent: color_percent(set.memory(), allocatable.memory()),
        }
    }
}

/// Renders a report as one table per node followed by a cluster table
pub struct TableRenderer {
    out: String,
    show_excluded: bool,
}

impl TableRenderer {
    pub fn new(show_excluded: bool) -> Self {
        Self {
            out: String::new(),
            show_excluded,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn write_node_header(&mut self, node: &NodeReport) {
        let descriptor = &node.node;
        let mut header = format!("{} {}", "Node:".bold(), descriptor.name.red().bold());
        if let Some(instance_type) = descriptor.instance_type() {
            let _ = write!(header, "  {}", instance_type.cyan());
        }
        if let Some(provisioning) = descriptor.provisioning() {
            let _ = write!(header, "  {}", provisioning.cyan());
        }
        let _ = writeln!(self.out, "{}", header);

        if !descriptor.taints.is_empty() {
            let taints: Vec<String> = descriptor.taints.iter().map(ToString::to_string).collect();
            let _ = writeln!(self.out, "Taints: {}", taints.join(", "));
        }

        match &node.kubelet_used {
            Some(used) => {
                let _ = writeln!(
                    self.out,
                    "Kubelet usage: {} cores, {} GiB",
                    format_cores(used.cpu()),
                    format_gib(used.memory())
                );
            }
            None => {
                let _ = writeln!(self.out, "{}", "Live usage unavailable".dimmed());
            }
        }
    }
}

impl ReportRenderer for TableRenderer {
    fn render_node(&mut self, node: &NodeReport) {
        self.write_node_header(node);

        let mut rows: Vec<PodRow> = node
            .pods
            .iter()
            .filter(|p| self.show_excluded || !p.excluded)
            .map(PodRow::for_pod)
            .collect();
        rows.push(PodRow::summary(node));
        rows.push(PodRow::bound("allocatable".green().to_string(), &node.stat.allocatable));
        rows.push(PodRow::bound("capacity".to_string(), &node.stat.capacity));

        let table = Table::new(rows).with(Style::rounded()).to_string();
        let _ = writeln!(self.out, "{}\n", table);
    }

    fn render_cluster(&mut self, cluster: &ResourceStat) {
        let _ = writeln!(self.out, "{}", "Cluster".bold());
        let _ = writeln!(self.out, "{}", "=".repeat(50));

        let allocatable = &cluster.allocatable;
        let rows = vec![
            ClusterRow::new("capacity", &cluster.capacity, allocatable),
            ClusterRow::new("allocatable", allocatable, allocatable),
            ClusterRow::new("used", &cluster.used, allocatable),
            ClusterRow::new("requested", &cluster.requested, allocatable),
            ClusterRow::new("limit", &cluster.limit, allocatable),
        ];

        let table = Table::new(rows).with(Style::rounded()).to_string();
        let _ = writeln!(self.out, "{}", table);
    }
}
