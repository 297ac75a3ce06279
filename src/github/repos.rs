//! GitHub repository operations.

use crate::error::Result;
use crate::github::GitHubClient;
use serde::{Deserialize, Serialize};

/// Repository information from GitHub API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GitHubRepo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub html_url: String,
    pub created_at: Option<String>,
    #[serde(default)]
    pub archived: bool,
    pub visibility: Option<String>,
}

/// Repository listing and update operations.
pub trait RepoOps {
    /// List all repositories in an organization, following pagination links.
    fn list_org_repos(&self, org: &str) -> Result<Vec<GitHubRepo>>;

    /// Mark a repository as archived.
    fn archive_repo(&self, owner: &str, name: &str) -> Result<GitHubRepo>;
}

impl RepoOps for GitHubClient {
    fn list_org_repos(&self, org: &str) -> Result<Vec<GitHubRepo>> {
        let endpoint = format!("/orgs/{}/repos?per_page=100&type=all", org);
        let repos: Vec<GitHubRepo> = self.get_paginated(&endpoint)?;
        tracing::info!(org, repo_count = repos.len(), "Retrieved repositories");
        Ok(repos)
    }

    fn archive_repo(&self, owner: &str, name: &str) -> Result<GitHubRepo> {
        let endpoint = format!("/repos/{}/{}", owner, name);
        self.patch(&endpoint, &serde_json::json!({ "archived": true }))
    }
}

/// Extension methods for filtering repository lists.
pub trait RepoFilterExt {
    /// Filter to non-archived repositories.
    fn active(self) -> Self;

    /// Keep only repositories whose name appears on the allow-list.
    fn on_list(self, names: &[String]) -> Self;
}

impl RepoFilterExt for Vec<GitHubRepo> {
    fn active(self) -> Self {
        self.into_iter().filter(|r| !r.archived).collect()
    }

    fn on_list(self, names: &[String]) -> Self {
        self.into_iter()
            .filter(|r| names.iter().any(|n| n == &r.name))
            .collect()
    }
}
