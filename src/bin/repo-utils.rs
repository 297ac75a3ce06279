//! CLI for repo-utils.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use repo_utils::prelude::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "repo-utils")]
#[command(
    author,
    version,
    about = "GitHub organization admin and hub statistics",
    long_about = None
)]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List repositories in the organization
    ListRepos {
        /// GitHub organization (overrides config)
        #[arg(long)]
        org: Option<String>,
    },

    /// Archive the repositories on the archive list
    ArchiveRepos {
        /// GitHub organization (overrides config)
        #[arg(long)]
        org: Option<String>,

        /// Repository to archive; repeat to replace the configured list
        #[arg(long = "repo")]
        repos: Vec<String>,

        /// Log what would change without changing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply a branch ruleset to the repositories on the ruleset list
    ApplyRulesets {
        /// GitHub organization (overrides config)
        #[arg(long)]
        org: Option<String>,

        /// Ruleset JSON file (overrides config)
        #[arg(long)]
        ruleset: Option<PathBuf>,

        /// Repository to update; repeat to replace the configured list
        #[arg(long = "repo")]
        repos: Vec<String>,

        /// Log what would change without changing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Count model-output and target-data rows for each hub
    HubStats {
        /// Hub as owner/name; repeat to replace the configured list
        #[arg(long = "hub")]
        hubs: Vec<String>,

        /// Output directory for per-hub parquet files and reports
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of counting threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Stop listing each directory after this many files (0 = no limit)
        #[arg(long)]
        file_limit: Option<usize>,
    },

    /// Rebuild the combined reports from parquet files already on disk
    HubReport {
        /// Directory holding per-hub parquet files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    repo_utils::logging::init(cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::ListRepos { org } => cmd_list_repos(&config, org),
        Commands::ArchiveRepos { org, repos, dry_run } => {
            cmd_archive_repos(&config, org, repos, dry_run)
        }
        Commands::ApplyRulesets {
            org,
            ruleset,
            repos,
            dry_run,
        } => cmd_apply_rulesets(&config, org, ruleset, repos, dry_run),
        Commands::HubStats {
            hubs,
            output_dir,
            workers,
            file_limit,
        } => cmd_hub_stats(&config, hubs, output_dir, workers, file_limit),
        Commands::HubReport { output_dir } => cmd_hub_report(&config, output_dir),
    }
}

fn client() -> Result<GitHubClient> {
    GitHubClient::from_env().context("Cannot create GitHub client")
}

fn pick_list(cli: Vec<String>, configured: &[String]) -> Vec<String> {
    if cli.is_empty() {
        configured.to_vec()
    } else {
        cli
    }
}

fn cmd_list_repos(config: &Config, org: Option<String>) -> Result<()> {
    let org = org.unwrap_or_else(|| config.org.clone());
    let client = client()?;

    let repos = list_repos(&client, &org).context("Failed to list repositories")?;
    print!("{}", format_repo_table(&org, &repos));
    Ok(())
}

fn cmd_archive_repos(
    config: &Config,
    org: Option<String>,
    repos: Vec<String>,
    dry_run: bool,
) -> Result<()> {
    let org = org.unwrap_or_else(|| config.org.clone());
    let allow_list = pick_list(repos, &config.archive);
    if allow_list.is_empty() {
        tracing::warn!("No repositories on the archive list");
        return Ok(());
    }
    let client = client()?;

    let summary =
        archive_repos(&client, &org, &allow_list, dry_run).context("Archiving failed")?;
    if summary.failed() > 0 {
        bail!("{} repositories could not be archived", summary.failed());
    }
    Ok(())
}

fn cmd_apply_rulesets(
    config: &Config,
    org: Option<String>,
    ruleset: Option<PathBuf>,
    repos: Vec<String>,
    dry_run: bool,
) -> Result<()> {
    let org = org.unwrap_or_else(|| config.org.clone());
    let ruleset_path = ruleset.unwrap_or_else(|| config.ruleset_file.clone());
    let allow_list = pick_list(repos, &config.rulesets);
    if allow_list.is_empty() {
        tracing::warn!("No repositories on the ruleset list");
        return Ok(());
    }

    let ruleset = Ruleset::from_json(&ruleset_path)
        .with_context(|| format!("Failed to load ruleset {}", ruleset_path.display()))?;
    let client = client()?;

    let summary = apply_rulesets(&client, &org, &ruleset, &allow_list, dry_run)
        .context("Applying rulesets failed")?;
    if summary.failed() > 0 {
        bail!("{} repositories did not receive the ruleset", summary.failed());
    }
    Ok(())
}

fn cmd_hub_stats(
    config: &Config,
    hubs: Vec<String>,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
    file_limit: Option<usize>,
) -> Result<()> {
    let hubs = pick_list(hubs, &config.hubs)
        .iter()
        .map(|h| HubRepo::parse(h))
        .collect::<repo_utils::Result<Vec<_>>>()
        .context("Invalid hub list")?;

    let mut options = HubStatsOptions::from(&config.hub_stats);
    if let Some(dir) = output_dir {
        options.output_dir = dir;
    }
    if let Some(workers) = workers {
        options.workers = workers;
    }
    if let Some(limit) = file_limit {
        options.file_limit = limit;
    }

    let client = client()?;
    let stats = HubStats::new(&client, options)?;
    let run = stats.run(&hubs).context("Hub stats failed")?;

    if let Some(reports) = &run.reports {
        print!("{}", format_summary(&reports.summary));
    }
    if !run.is_success() {
        let names: Vec<String> = run.failed.iter().map(|(hub, _)| hub.full_name()).collect();
        bail!("Stats could not be collected for: {}", names.join(", "));
    }
    Ok(())
}

fn cmd_hub_report(config: &Config, output_dir: Option<PathBuf>) -> Result<()> {
    let output_dir = output_dir.unwrap_or_else(|| config.hub_stats.output_dir.clone());

    match rebuild_reports(&output_dir).context("Failed to rebuild reports")? {
        Some(reports) => print!("{}", format_summary(&reports.summary)),
        None => println!("Nothing to summarize in {}", output_dir.display()),
    }
    Ok(())
}
