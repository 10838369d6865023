//! Configuration management for the CLI
//!
//! Settings are layered: built-in defaults, then the JSON config file, then
//! `KUBE_USAGE_*` environment variables, then command-line flags.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use usage_lib::{ExclusionPolicy, DEFAULT_EXCLUDED_NAMESPACE};

use crate::output::OutputFormat;
use crate::ReportArgs;

const ENV_PREFIX: &str = "KUBE_USAGE";

/// Settings from the config file and environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Port of a running `kubectl proxy` used to reach kubelet stats
    #[serde(default)]
    pub proxy_port: Option<u16>,

    /// Full base URL of the API proxy; takes precedence over `proxy_port`
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Namespaces left out of node totals
    #[serde(default = "default_excluded_namespaces")]
    pub exclude_namespaces: Vec<String>,

    /// Only report pods from this namespace
    #[serde(default)]
    pub namespace: Option<String>,

    /// Default output format (`table` or `json`)
    #[serde(default)]
    pub format: Option<String>,

    /// Timeout for each kubelet stats request
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_excluded_namespaces() -> Vec<String> {
    vec![DEFAULT_EXCLUDED_NAMESPACE.to_string()]
}

fn default_fetch_timeout() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            proxy_port: None,
            proxy_url: None,
            exclude_namespaces: default_excluded_namespaces(),
            namespace: None,
            format: None,
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// Where live usage comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageMode {
    Disabled,
    /// Kubelet stats through an API proxy at this base URL
    Proxy(Url),
}

/// Settings for one report run after flags are applied
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub usage: UsageMode,
    pub exclusion: ExclusionPolicy,
    pub namespace: Option<String>,
    pub show_excluded: bool,
    pub fetch_timeout: Duration,
}

impl Settings {
    /// Load from `path`, or the default config file when `None`, then the
    /// environment. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => config_path(),
        };
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("exclude_namespaces"),
            )
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Output format, unless overridden on the command line
    pub fn output_format(&self) -> Result<OutputFormat> {
        match &self.format {
            Some(format) => OutputFormat::from_str(format, true)
                .map_err(|e| anyhow::anyhow!("Invalid output format '{}': {}", format, e)),
            None => Ok(OutputFormat::default()),
        }
    }

    /// Apply report flags on top of these settings
    pub fn resolve(&self, args: &ReportArgs) -> Result<ReportSettings> {
        let proxy_url = args.proxy_url.clone().or_else(|| self.proxy_url.clone());
        let proxy_port = args.proxy_port.or(self.proxy_port);

        let usage = match (proxy_url, proxy_port) {
            (Some(url), _) => UsageMode::Proxy(parse_base_url(&url)?),
            (None, Some(port)) => {
                UsageMode::Proxy(parse_base_url(&format!("http://localhost:{}", port))?)
            }
            (None, None) => UsageMode::Disabled,
        };

        let exclusion = if args.no_exclude {
            ExclusionPolicy::none()
        } else if !args.exclude_namespace.is_empty() {
            ExclusionPolicy::new(args.exclude_namespace.iter().cloned())
        } else {
            ExclusionPolicy::new(self.exclude_namespaces.iter().cloned())
        };

        Ok(ReportSettings {
            usage,
            exclusion,
            namespace: args.namespace.clone().or_else(|| self.namespace.clone()),
            show_excluded: args.show_excluded,
            fetch_timeout: Duration::from_secs(args.timeout.unwrap_or(self.fetch_timeout_secs)),
        })
    }
}

/// Base URL with a trailing slash, so relative paths join below it
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).with_context(|| format!("Invalid proxy URL '{}'", raw))
}

/// Default configuration file path
fn config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("kube-usage").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args() -> ReportArgs {
        ReportArgs {
            proxy_port: None,
            proxy_url: None,
            namespace: None,
            exclude_namespace: Vec::new(),
            no_exclude: false,
            show_excluded: false,
            timeout: None,
        }
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        let resolved = settings.resolve(&args()).unwrap();

        assert_eq!(resolved.usage, UsageMode::Disabled);
        assert_eq!(
            resolved.exclusion,
            ExclusionPolicy::new([DEFAULT_EXCLUDED_NAMESPACE])
        );
        assert_eq!(resolved.fetch_timeout, Duration::from_secs(10));
        assert!(matches!(settings.output_format().unwrap(), OutputFormat::Table));
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"{"proxy_port": 8001, "exclude_namespaces": ["kube-system", "monitoring"], "format": "json"}"#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.proxy_port, Some(8001));
        assert_eq!(settings.exclude_namespaces, vec!["kube-system", "monitoring"]);
        assert_eq!(settings.fetch_timeout_secs, 10);
        assert!(matches!(settings.output_format().unwrap(), OutputFormat::Json));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.json"))).unwrap();

        assert_eq!(settings.exclude_namespaces, vec![DEFAULT_EXCLUDED_NAMESPACE]);
    }

    #[test]
    fn test_flags_override_settings() {
        let settings = Settings {
            proxy_port: Some(8001),
            namespace: Some("team-a".to_string()),
            ..Settings::default()
        };
        let mut flags = args();
        flags.proxy_port = Some(9001);
        flags.exclude_namespace = vec!["monitoring".to_string()];
        flags.timeout = Some(3);

        let resolved = settings.resolve(&flags).unwrap();

        assert_eq!(
            resolved.usage,
            UsageMode::Proxy(Url::parse("http://localhost:9001/").unwrap())
        );
        assert_eq!(resolved.exclusion, ExclusionPolicy::new(["monitoring"]));
        assert_eq!(resolved.namespace.as_deref(), Some("team-a"));
        assert_eq!(resolved.fetch_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_proxy_url_wins_over_port() {
        let mut flags = args();
        flags.proxy_port = Some(8001);
        flags.proxy_url = Some("https://gateway.example/k8s".to_string());

        let resolved = Settings::default().resolve(&flags).unwrap();

        assert_eq!(
            resolved.usage,
            UsageMode::Proxy(Url::parse("https://gateway.example/k8s/").unwrap())
        );
    }

    #[test]
    fn test_no_exclude_clears_policy() {
        let mut flags = args();
        flags.no_exclude = true;
        flags.exclude_namespace = vec!["ignored".to_string()];

        let resolved = Settings::default().resolve(&flags).unwrap();

        assert_eq!(resolved.exclusion, ExclusionPolicy::none());
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let settings = Settings {
            format: Some("yaml".to_string()),
            ..Settings::default()
        };
        assert!(settings.output_format().is_err());
    }
}
