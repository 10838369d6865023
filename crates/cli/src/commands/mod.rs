//! CLI command implementations

pub mod report;

use std::path::PathBuf;

use crate::output::OutputFormat;

/// Global flags every command needs
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub config: Option<PathBuf>,
    /// Overrides the format from the config file
    pub format: Option<OutputFormat>,
}
