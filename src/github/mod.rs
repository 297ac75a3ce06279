//! GitHub API integration.
//!
//! This module provides a client for interacting with the GitHub API to:
//! - List and archive repositories in an organization
//! - Apply branch-protection rulesets
//! - Walk repository directories and download their files
//!
//! # Example
//!
//! ```rust,no_run
//! use repo_utils::github::{ContentsOps, GitHubClient, RepoOps};
//!
//! let client = GitHubClient::from_env()?;
//!
//! for repo in client.list_org_repos("my-org")? {
//!     println!("{} (archived: {})", repo.name, repo.archived);
//! }
//!
//! let files = client.list_files("my-org", "my-hub", "model-output")?;
//! println!("{} data files", files.len());
//! # Ok::<(), repo_utils::error::RepoUtilsError>(())
//! ```

mod client;
mod contents;
mod repos;
mod rulesets;

pub use client::{GitHubClient, RetryPolicy};
pub use contents::{COUNTABLE_EXTENSIONS, ContentEntry, ContentsOps, EntryKind};
pub use repos::{GitHubRepo, RepoFilterExt, RepoOps};
pub use rulesets::{
    BypassActor, CreatedRuleset, Enforcement, RefNameCondition, Ruleset, RulesetConditions,
    RulesetOps, RulesetRule, RulesetTarget,
};
