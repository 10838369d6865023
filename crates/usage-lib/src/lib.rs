//! Resource usage aggregation for Kubernetes clusters
//!
//! This crate provides the core of the usage report:
//! - Kubernetes quantity parsing and resource set aggregation
//! - The pod / node / cluster resource stat tree
//! - Network rate derivation from kubelet counters
//! - Kubelet Summary API wire types
//! - Source traits and the report pipeline

pub mod models;
pub mod observability;
pub mod quantity;
pub mod rate;
pub mod report;
pub mod source;
pub mod stat;
pub mod summary;

pub use models::*;
pub use observability::ReportLogger;
pub use quantity::{merge, parse_quantity, QuantityError, ResourceSet, CPU, MEMORY};
pub use rate::{derive_rates, NetworkRates, RateError};
pub use report::{
    build_node_report, build_report, ClusterReport, NodeReport, PodRates, PodReport,
    ReportOptions, ReportRenderer,
};
pub use source::{
    DeclaredResourceSource, DisabledUsageSource, LiveUsageSource, SourceError, UsageUnavailable,
};
pub use stat::{ExclusionPolicy, ResourceStat, DEFAULT_EXCLUDED_NAMESPACE};
