//! Recursive, paginated listing of repository directories.

use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::error::{RepoUtilsError, Result};
use crate::github::GitHubClient;
use crate::github::client::next_link;

/// File extensions whose rows can be counted.
pub const COUNTABLE_EXTENSIONS: [&str; 2] = [".csv", ".parquet"];

/// Kind of an entry returned by the contents API.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    pub path: String,
    pub download_url: Option<String>,
}

impl ContentEntry {
    /// Download URL of a file whose extension we know how to count.
    pub fn countable_url(&self) -> Option<&str> {
        if self.kind != EntryKind::File {
            return None;
        }
        self.download_url
            .as_deref()
            .filter(|url| COUNTABLE_EXTENSIONS.iter().any(|ext| url.ends_with(ext)))
    }
}

/// Directory listing operations.
pub trait ContentsOps {
    /// List download URLs of every CSV and Parquet file under `directory`.
    ///
    /// A missing directory yields an empty list.
    fn list_files(&self, owner: &str, repo: &str, directory: &str) -> Result<Vec<String>>;

    /// Like [`ContentsOps::list_files`] but stops after `limit` files (0 = no limit).
    fn list_files_limited(
        &self,
        owner: &str,
        repo: &str,
        directory: &str,
        limit: usize,
    ) -> Result<Vec<String>>;
}

impl ContentsOps for GitHubClient {
    fn list_files(&self, owner: &str, repo: &str, directory: &str) -> Result<Vec<String>> {
        self.list_files_limited(owner, repo, directory, 0)
    }

    fn list_files_limited(
        &self,
        owner: &str,
        repo: &str,
        directory: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut files = Vec::new();
        collect_files(self, owner, repo, directory, limit, &mut files)?;
        Ok(files)
    }
}

fn limit_reached(files: &[String], limit: usize) -> bool {
    limit > 0 && files.len() >= limit
}

fn collect_files(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    directory: &str,
    limit: usize,
    files: &mut Vec<String>,
) -> Result<()> {
    let mut next = Some(client.url(&format!(
        "/repos/{}/{}/contents/{}",
        owner,
        repo,
        directory.trim_matches('/')
    )));

    while let Some(url) = next {
        let response = client.execute(client.request(Method::GET, &url))?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!(%url, "directory not found");
            return Ok(());
        }
        let response = GitHubClient::check(response)?;
        next = next_link(response.headers());

        let entries: Vec<ContentEntry> = response.json().map_err(|e| RepoUtilsError::GitHub {
            message: format!("Failed to parse listing {}: {}", url, e),
        })?;

        for entry in entries {
            if let Some(download_url) = entry.countable_url() {
                files.push(download_url.to_string());
            } else if entry.kind == EntryKind::Dir {
                collect_files(client, owner, repo, &entry.path, limit, files)?;
            }
            if limit_reached(files, limit) {
                return Ok(());
            }
        }
    }

    Ok(())
}
