//! Per-hub state machine: discover, count, aggregate, persist.

use std::fmt;
use std::path::PathBuf;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{RepoUtilsError, Result};
use crate::github::{ContentsOps, GitHubClient};
use crate::hubstats::aggregate::{DEFAULT_MODEL_ID_PREFIX_LEN, aggregate};
use crate::hubstats::counter::RowCounter;
use crate::hubstats::report::{RebuiltReports, persist, rebuild_reports};
use crate::hubstats::{FileRecord, HubDirectory, HubRepo, RowCount};

/// Settings for a hub-stats run.
#[derive(Debug, Clone)]
pub struct HubStatsOptions {
    pub output_dir: PathBuf,
    /// Size of the counting worker pool.
    pub workers: usize,
    /// Stop listing a directory after this many files (0 = no limit).
    pub file_limit: usize,
    pub model_id_prefix_len: usize,
}

impl Default for HubStatsOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/hub_stats"),
            workers: 8,
            file_limit: 0,
            model_id_prefix_len: DEFAULT_MODEL_ID_PREFIX_LEN,
        }
    }
}

/// Where a hub is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Discovering,
    Counting,
    Aggregating,
    Persisted,
}

impl fmt::Display for HubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HubState::Discovering => "discovering",
            HubState::Counting => "counting",
            HubState::Aggregating => "aggregating",
            HubState::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Outcome of [`HubStats::run`].
#[derive(Debug)]
pub struct HubStatsRun {
    pub persisted: Vec<PathBuf>,
    /// Hubs whose listing failed, with the error message.
    pub failed: Vec<(HubRepo, String)>,
    pub reports: Option<RebuiltReports>,
}

impl HubStatsRun {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives the hub-stats pipeline with one shared client and worker pool.
pub struct HubStats<'a> {
    client: &'a GitHubClient,
    options: HubStatsOptions,
    pool: ThreadPool,
}

impl<'a> HubStats<'a> {
    pub fn new(client: &'a GitHubClient, options: HubStatsOptions) -> Result<Self> {
        if options.workers == 0 {
            return Err(RepoUtilsError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("row-counter-{}", i))
            .build()
            .map_err(|e| {
                RepoUtilsError::InvalidConfig(format!("Cannot start worker pool: {}", e))
            })?;

        Ok(Self {
            client,
            options,
            pool,
        })
    }

    /// Collect and persist stats for one hub.
    ///
    /// A listing failure aborts the hub before anything is written.
    pub fn collect_hub(&self, hub: &HubRepo) -> Result<PathBuf> {
        let counter = RowCounter::new(self.client);
        let mut table: Vec<RowCount> = Vec::new();

        for directory in HubDirectory::ALL {
            transition(hub, directory, HubState::Discovering);
            let records = self.discover(hub, directory)?;
            tracing::info!(repo = %hub, dir = %directory, count = records.len(), "found files");
            if records.is_empty() {
                continue;
            }

            transition(hub, directory, HubState::Counting);
            let counts = counter.count_all(&records, &self.pool);

            transition(hub, directory, HubState::Aggregating);
            table.extend(aggregate(
                counts,
                directory,
                hub,
                self.options.model_id_prefix_len,
            ));
        }

        let path = persist(&table, hub, &self.options.output_dir)?;
        tracing::debug!(repo = %hub, state = %HubState::Persisted, "hub state");
        Ok(path)
    }

    fn discover(&self, hub: &HubRepo, directory: HubDirectory) -> Result<Vec<FileRecord>> {
        let urls = self.client.list_files_limited(
            &hub.owner,
            &hub.name,
            directory.as_str(),
            self.options.file_limit,
        )?;
        let repository = hub.full_name();
        Ok(urls
            .into_iter()
            .map(|url| FileRecord {
                url,
                directory,
                repository: repository.clone(),
            })
            .collect())
    }

    /// Process every hub in order, then rebuild the combined reports.
    ///
    /// A hub that fails is recorded and skipped; the others still run.
    pub fn run(&self, hubs: &[HubRepo]) -> Result<HubStatsRun> {
        if self.options.file_limit > 0 {
            tracing::info!(limit = self.options.file_limit, "Limiting file count for testing");
        }

        let mut persisted = Vec::new();
        let mut failed = Vec::new();

        for hub in hubs {
            tracing::info!(repo = %hub, "Getting stats");
            match self.collect_hub(hub) {
                Ok(path) => persisted.push(path),
                Err(e) => {
                    tracing::error!(repo = %hub, error = %e, "Failed to collect hub stats");
                    failed.push((hub.clone(), e.to_string()));
                }
            }
        }

        tracing::info!("Updating .csv to include data for all hubs");
        let reports = rebuild_reports(&self.options.output_dir)?;

        Ok(HubStatsRun {
            persisted,
            failed,
            reports,
        })
    }
}

fn transition(hub: &HubRepo, directory: HubDirectory, state: HubState) {
    tracing::debug!(repo = %hub, dir = %directory, %state, "hub state");
}
