//! Configuration: organization, allow-lists and hub-stats settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RepoUtilsError, Result};
use crate::hubstats::{DEFAULT_MODEL_ID_PREFIX_LEN, HubRepo, HubStatsOptions};

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "repo-utils.yaml";

/// Settings for the hub-stats pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubStatsConfig {
    pub output_dir: PathBuf,
    pub workers: usize,
    pub file_limit: usize,
    pub model_id_prefix_len: usize,
}

impl Default for HubStatsConfig {
    fn default() -> Self {
        let options = HubStatsOptions::default();
        Self {
            output_dir: options.output_dir,
            workers: options.workers,
            file_limit: options.file_limit,
            model_id_prefix_len: DEFAULT_MODEL_ID_PREFIX_LEN,
        }
    }
}

impl From<&HubStatsConfig> for HubStatsOptions {
    fn from(config: &HubStatsConfig) -> Self {
        HubStatsOptions {
            output_dir: config.output_dir.clone(),
            workers: config.workers,
            file_limit: config.file_limit,
            model_id_prefix_len: config.model_id_prefix_len,
        }
    }
}

/// Top-level configuration.
///
/// # Example YAML
///
/// ```yaml
/// org: reichlab
/// archive:
///   - duck-hub
/// rulesets:
///   - reichlab-python-template
/// ruleset_file: rulesets/default_branch_protections.json
/// hubs:
///   - HopkinsIDD/rsv-forecast-hub
/// hub_stats:
///   output_dir: data/hub_stats
///   workers: 8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// GitHub organization for the admin commands.
    pub org: String,

    /// Repositories to archive.
    pub archive: Vec<String>,

    /// Repositories that receive the branch ruleset.
    pub rulesets: Vec<String>,

    /// JSON ruleset applied by `apply-rulesets`.
    pub ruleset_file: PathBuf,

    /// Hubs to collect statistics for, as `owner/name`.
    pub hubs: Vec<String>,

    pub hub_stats: HubStatsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            org: "reichlab".to_string(),
            archive: Vec::new(),
            rulesets: Vec::new(),
            ruleset_file: PathBuf::from("rulesets/default_branch_protections.json"),
            hubs: Vec::new(),
            hub_stats: HubStatsConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Load from a YAML or JSON file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            _ => Self::from_yaml(path),
        }
    }

    /// Load config from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(|e| {
            RepoUtilsError::InvalidConfig(format!("Failed to parse YAML config: {}", e))
        })
    }

    /// Load config from a JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            RepoUtilsError::InvalidConfig(format!("Failed to parse JSON config: {}", e))
        })
    }

    /// Parsed hub list. Any malformed entry fails the whole list.
    pub fn hub_repos(&self) -> Result<Vec<HubRepo>> {
        self.hubs.iter().map(|h| HubRepo::parse(h)).collect()
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        RepoUtilsError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read config file {}: {}", path.display(), e),
        ))
    })
}
