//! # repo-utils
//!
//! Administrative tooling for a GitHub organization and row-count statistics
//! for Hubverse data repositories.
//!
//! This crate provides:
//! - An authenticated GitHub client with retry and backoff
//! - Organization repository listing, archiving and ruleset application
//! - Recursive listing of hub `model-output` and `target-data` directories
//! - Concurrent row counting of remote CSV and Parquet files
//! - Per-hub Parquet output with combined CSV reports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use repo_utils::prelude::*;
//!
//! let client = GitHubClient::from_env()?;
//! let hubs = vec![HubRepo::parse("cdcepi/FluSight-forecast-hub")?];
//!
//! let run = HubStats::new(&client, HubStatsOptions::default())?.run(&hubs)?;
//! for path in &run.persisted {
//!     println!("saved {}", path.display());
//! }
//! # Ok::<(), repo_utils::error::RepoUtilsError>(())
//! ```
//!
//! ## Organization Administration
//!
//! ```rust,no_run
//! use repo_utils::prelude::*;
//!
//! let client = GitHubClient::from_env()?;
//! let ruleset = Ruleset::from_json("rulesets/default_branch_protections.json")?;
//! let allow_list = vec!["my-repo".to_string()];
//!
//! let summary = apply_rulesets(&client, "my-org", &ruleset, &allow_list, true)?;
//! println!("{} repositories would change", summary.results.len());
//! # Ok::<(), repo_utils::error::RepoUtilsError>(())
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod github;
pub mod hubstats;
pub mod logging;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::admin::{
        AdminSummary, RepoResult, RepoStatus, apply_rulesets, archive_repos, format_repo_table,
        list_repos,
    };
    pub use crate::config::{Config, HubStatsConfig};
    pub use crate::error::{RepoUtilsError, Result};
    pub use crate::github::{
        ContentsOps, GitHubClient, GitHubRepo, RepoFilterExt, RepoOps, RetryPolicy, Ruleset,
        RulesetOps,
    };
    pub use crate::hubstats::{
        HubDirectory, HubRepo, HubStats, HubStatsOptions, HubStatsRun, RowCount, RowCounter,
        SummaryRow, format_summary, rebuild_reports,
    };
}

pub use prelude::*;
