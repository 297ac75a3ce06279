//! Grouping of per-file counts into report rows.

use std::collections::BTreeMap;

use crate::hubstats::{FileCount, HubDirectory, HubRepo, RowCount};

/// Width of the `YYYY-MM-DD-` date stamp that starts model-output file names.
pub const DEFAULT_MODEL_ID_PREFIX_LEN: usize = 11;

/// Model identifier encoded in a model-output file name.
///
/// Drops the first `prefix_len` characters, any `_`/`-` separators left
/// behind, and everything from the first `.` on.
/// `2023-01-07-myteam-mymodel.csv` yields `myteam-mymodel`.
pub fn derive_model_id(file_name: &str, prefix_len: usize) -> Option<String> {
    let rest: String = file_name.chars().skip(prefix_len).collect();
    let rest = rest.trim_start_matches(['_', '-']);
    let model_id = rest.split('.').next().unwrap_or_default();
    if model_id.is_empty() {
        None
    } else {
        Some(model_id.to_string())
    }
}

/// Group counts by file name, summing duplicates, and label them.
///
/// Rows come back sorted by file name.
pub fn aggregate(
    counts: impl IntoIterator<Item = FileCount>,
    directory: HubDirectory,
    repo: &HubRepo,
    prefix_len: usize,
) -> Vec<RowCount> {
    let mut grouped: BTreeMap<String, i64> = BTreeMap::new();
    for count in counts {
        *grouped.entry(count.file_name).or_default() += count.row_count;
    }

    let repo_name = repo.full_name();
    grouped
        .into_iter()
        .map(|(file, row_count)| {
            let model_id = match directory {
                HubDirectory::ModelOutput => derive_model_id(&file, prefix_len),
                HubDirectory::TargetData => None,
            };
            RowCount {
                file,
                row_count,
                dir: directory,
                repo: repo_name.clone(),
                model_id,
            }
        })
        .collect()
}
