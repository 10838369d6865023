//! Kubelet Summary API (`/stats/summary`) wire types
//!
//! Only the shape is modelled here; every section is optional because
//! kubelet omits stats it has not collected yet.

use crate::models::{LiveUsageSample, LiveUsageSnapshot, PodKey};
use crate::quantity::{ResourceSet, CPU, MEMORY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub node: NodeStats,
    #[serde(default)]
    pub pods: Vec<PodStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub system_containers: Vec<ContainerStats>,
    pub start_time: Option<DateTime<Utc>>,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub network: Option<NetworkStats>,
    pub fs: Option<FsStats>,
    pub runtime: Option<RuntimeStats>,
    pub rlimit: Option<RlimitStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStats {
    pub pod_ref: PodReference,
    /// Kubelet sends `null` for a zero start time
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub containers: Vec<ContainerStats>,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub network: Option<NetworkStats>,
    #[serde(default)]
    pub volume: Vec<VolumeStats>,
    #[serde(rename = "ephemeral-storage")]
    pub ephemeral_storage: Option<FsStats>,
    #[serde(rename = "process_stats")]
    pub process_stats: Option<ProcessStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodReference {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub rootfs: Option<FsStats>,
    pub logs: Option<FsStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub time: Option<DateTime<Utc>>,
    pub usage_nano_cores: Option<u64>,
    pub usage_core_nano_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub time: Option<DateTime<Utc>>,
    pub available_bytes: Option<u64>,
    pub usage_bytes: Option<u64>,
    pub working_set_bytes: Option<u64>,
    pub rss_bytes: Option<u64>,
    pub page_faults: Option<u64>,
    pub major_page_faults: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub time: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub rx_bytes: Option<u64>,
    pub rx_errors: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub tx_errors: Option<u64>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStats {
    pub name: String,
    pub rx_bytes: Option<u64>,
    pub rx_errors: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub tx_errors: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsStats {
    pub time: Option<DateTime<Utc>>,
    pub available_bytes: Option<u64>,
    pub capacity_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
    pub inodes_free: Option<u64>,
    pub inodes: Option<u64>,
    pub inodes_used: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStats {
    pub name: String,
    #[serde(flatten)]
    pub fs: FsStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    pub image_fs: Option<FsStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RlimitStats {
    pub time: Option<DateTime<Utc>>,
    pub maxpid: Option<u64>,
    pub curproc: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessStats {
    pub process_count: Option<u64>,
}

fn cpu_and_memory(cpu: Option<&CpuStats>, memory: Option<&MemoryStats>) -> (u64, u64) {
    (
        cpu.and_then(|c| c.usage_nano_cores).unwrap_or(0),
        memory.and_then(|m| m.usage_bytes).unwrap_or(0),
    )
}

impl PodStats {
    pub fn key(&self) -> PodKey {
        PodKey::new(&self.pod_ref.namespace, &self.pod_ref.name)
    }

    /// Usage sample for this pod; missing stats read as zero
    pub fn to_sample(&self) -> LiveUsageSample {
        let (cpu_nano_cores, memory_bytes) =
            cpu_and_memory(self.cpu.as_ref(), self.memory.as_ref());
        let network = self.network.as_ref();

        LiveUsageSample {
            pod: self.key(),
            start_time: self.start_time,
            cpu_nano_cores,
            memory_bytes,
            rx_bytes: network.and_then(|n| n.rx_bytes).unwrap_or(0),
            tx_bytes: network.and_then(|n| n.tx_bytes).unwrap_or(0),
        }
    }
}

impl Summary {
    /// Decode a summary payload
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Convert into a snapshot keyed by pod identity. `node_name` is used
    /// when kubelet does not report one.
    pub fn into_snapshot(self, node_name: &str) -> LiveUsageSnapshot {
        let (cpu, memory) = cpu_and_memory(self.node.cpu.as_ref(), self.node.memory.as_ref());
        let node_name = if self.node.node_name.is_empty() {
            node_name.to_string()
        } else {
            self.node.node_name
        };

        LiveUsageSnapshot {
            node_name,
            node_used: ResourceSet::new().with(CPU, cpu).with(MEMORY, memory),
            pods: self
                .pods
                .iter()
                .map(|pod| (pod.key(), pod.to_sample()))
                .collect(),
        }
    }
}
