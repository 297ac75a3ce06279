//! Organization-wide repository administration.
//!
//! Each operation lists the organization's repositories, keeps the ones on
//! an allow-list, and issues one request per remaining repository. A failed
//! request is recorded and the loop moves on.

use crate::error::Result;
use crate::github::{GitHubClient, GitHubRepo, RepoFilterExt, RepoOps, Ruleset, RulesetOps};

/// Status of a repository after an admin operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoStatus {
    /// The change was applied.
    Updated,
    /// Dry run: the change would have been applied.
    WouldUpdate,
    /// The change was already in place (e.g. ruleset already exists).
    AlreadyApplied(String),
    /// The request failed.
    Failed(String),
}

/// Result for a single repository.
#[derive(Debug, Clone)]
pub struct RepoResult {
    pub name: String,
    pub status: RepoStatus,
}

/// Summary of an admin operation across the organization.
#[derive(Debug, Default)]
pub struct AdminSummary {
    pub results: Vec<RepoResult>,
}

impl AdminSummary {
    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, RepoStatus::Updated))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, RepoStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&RepoStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.status)).count()
    }

    fn push(&mut self, name: &str, status: RepoStatus) {
        self.results.push(RepoResult {
            name: name.to_string(),
            status,
        });
    }
}

/// Repositories on `allow_list` that are not archived yet.
fn targets(client: &GitHubClient, org: &str, allow_list: &[String]) -> Result<Vec<GitHubRepo>> {
    Ok(client.list_org_repos(org)?.on_list(allow_list).active())
}

/// Archive every listed repository that is not archived yet.
pub fn archive_repos(
    client: &GitHubClient,
    org: &str,
    allow_list: &[String],
    dry_run: bool,
) -> Result<AdminSummary> {
    let mut summary = AdminSummary::default();

    for repo in targets(client, org, allow_list)? {
        if dry_run {
            tracing::info!(repo = %repo.name, "Would archive repository");
            summary.push(&repo.name, RepoStatus::WouldUpdate);
            continue;
        }

        match client.archive_repo(org, &repo.name) {
            Ok(_) => {
                tracing::info!(repo = %repo.name, "Successfully archived repository");
                summary.push(&repo.name, RepoStatus::Updated);
            }
            Err(e) => {
                tracing::error!(repo = %repo.name, error = %e, "Failed to update repo");
                summary.push(&repo.name, RepoStatus::Failed(e.to_string()));
            }
        }
    }

    tracing::info!(count = summary.updated(), "Repository archive complete");
    Ok(summary)
}

/// Apply `ruleset` to every listed, non-archived repository.
///
/// A 422 response usually means a ruleset with that name already exists and
/// is reported as [`RepoStatus::AlreadyApplied`].
pub fn apply_rulesets(
    client: &GitHubClient,
    org: &str,
    ruleset: &Ruleset,
    allow_list: &[String],
    dry_run: bool,
) -> Result<AdminSummary> {
    let mut summary = AdminSummary::default();

    for repo in targets(client, org, allow_list)? {
        if dry_run {
            tracing::info!(
                repo = %repo.name,
                ruleset = %ruleset.name,
                "Would apply branch ruleset"
            );
            summary.push(&repo.name, RepoStatus::WouldUpdate);
            continue;
        }

        match client.create_ruleset(org, &repo.name, ruleset) {
            Ok(created) => {
                tracing::info!(
                    repo = %repo.name,
                    ruleset_id = created.id,
                    "Successfully applied branch ruleset"
                );
                summary.push(&repo.name, RepoStatus::Updated);
            }
            Err(e) if e.status().is_some_and(|s| s.as_u16() == 422) => {
                tracing::warn!(
                    repo = %repo.name,
                    error = %e,
                    "Failed to apply branch ruleset (likely because it already exists)"
                );
                summary.push(&repo.name, RepoStatus::AlreadyApplied(e.to_string()));
            }
            Err(e) => {
                tracing::error!(repo = %repo.name, error = %e, "Failed to apply branch ruleset");
                summary.push(&repo.name, RepoStatus::Failed(e.to_string()));
            }
        }
    }

    tracing::info!(count = summary.updated(), "All rulesets applied");
    Ok(summary)
}

/// All repositories of an organization.
pub fn list_repos(client: &GitHubClient, org: &str) -> Result<Vec<GitHubRepo>> {
    let repos = client.list_org_repos(org)?;
    tracing::info!(count = repos.len(), "Repository report complete");
    Ok(repos)
}

/// Render repositories as an aligned table with one row per repository and
/// its GitHub link in the last column.
pub fn format_repo_table(org: &str, repos: &[GitHubRepo]) -> String {
    const HEADER: [&str; 6] = ["name", "created_at", "archived", "visibility", "id", "url"];

    let rows: Vec<[String; 6]> = repos
        .iter()
        .map(|r| {
            [
                r.name.clone(),
                r.created_at.clone().unwrap_or_default(),
                r.archived.to_string(),
                r.visibility.clone().unwrap_or_default(),
                r.id.to_string(),
                r.html_url.clone(),
            ]
        })
        .collect();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let render = |cells: [&str; 6]| -> String {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell))
            .collect();
        format!("{}\n", line.join("  ").trim_end())
    };

    let mut out = format!("Repositories in the {} GitHub organization\n", org);
    out.push_str(&render(HEADER));
    out.push_str(&render(widths.map(|w| "-".repeat(w)).each_ref().map(String::as_str)));
    for row in &rows {
        out.push_str(&render(row.each_ref().map(String::as_str)));
    }
    out
}
