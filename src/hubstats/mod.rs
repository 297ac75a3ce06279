//! Row-count statistics for Hubverse repositories.
//!
//! For every hub the pipeline lists the CSV and Parquet files under
//! `model-output` and `target-data`, counts their rows on a worker pool,
//! groups the counts per file, and writes `{repo}.parquet` to the output
//! directory. Afterwards every Parquet file in the output directory is
//! combined into `hub_stats.csv` and `hub_stats_summary.csv`.
//!
//! ```rust,no_run
//! use repo_utils::github::GitHubClient;
//! use repo_utils::hubstats::{HubRepo, HubStats, HubStatsOptions};
//!
//! let client = GitHubClient::from_env()?;
//! let hubs = vec![HubRepo::parse("HopkinsIDD/rsv-forecast-hub")?];
//!
//! let run = HubStats::new(&client, HubStatsOptions::default())?.run(&hubs)?;
//! if let Some(reports) = run.reports {
//!     println!("{}", repo_utils::hubstats::format_summary(&reports.summary));
//! }
//! # Ok::<(), repo_utils::error::RepoUtilsError>(())
//! ```

mod aggregate;
mod counter;
mod pipeline;
mod report;

pub use aggregate::{DEFAULT_MODEL_ID_PREFIX_LEN, aggregate, derive_model_id};
pub use counter::{RowCounter, count_lines, file_name_from_url, parquet_metadata_len};
pub use pipeline::{HubState, HubStats, HubStatsOptions, HubStatsRun};
pub use report::{
    DETAIL_CSV, RebuiltReports, SUMMARY_CSV, SummaryRow, format_summary, persist, read_parquet,
    rebuild_reports, summarize,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RepoUtilsError, Result};

/// Top-level hub directory that holds countable files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HubDirectory {
    #[serde(rename = "model-output")]
    ModelOutput,
    #[serde(rename = "target-data")]
    TargetData,
}

impl HubDirectory {
    /// Directories in processing order.
    pub const ALL: [HubDirectory; 2] = [HubDirectory::ModelOutput, HubDirectory::TargetData];

    pub fn as_str(&self) -> &'static str {
        match self {
            HubDirectory::ModelOutput => "model-output",
            HubDirectory::TargetData => "target-data",
        }
    }
}

impl fmt::Display for HubDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HubDirectory {
    type Err = RepoUtilsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "model-output" => Ok(HubDirectory::ModelOutput),
            "target-data" => Ok(HubDirectory::TargetData),
            other => Err(RepoUtilsError::InvalidConfig(format!(
                "Unknown hub directory: {}",
                other
            ))),
        }
    }
}

/// A hub repository given as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HubRepo {
    pub owner: String,
    pub name: String,
}

impl HubRepo {
    /// Parse an `owner/name` string.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        match value.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(RepoUtilsError::InvalidRepoSpec(value.to_string())),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for HubRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A countable file discovered in a hub directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub url: String,
    pub directory: HubDirectory,
    pub repository: String,
}

/// Row count of a single file, as produced by the counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCount {
    pub file_name: String,
    pub row_count: i64,
}

/// One row of a repository report.
///
/// Field order is the column order of the Parquet and CSV outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCount {
    pub file: String,
    pub row_count: i64,
    pub dir: HubDirectory,
    pub repo: String,
    pub model_id: Option<String>,
}
