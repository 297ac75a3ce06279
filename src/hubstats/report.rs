//! Per-repository Parquet output and combined CSV reports.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::{Array, ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;

use crate::error::{RepoUtilsError, Result};
use crate::hubstats::{HubDirectory, HubRepo, RowCount};

/// Combined per-file report.
pub const DETAIL_CSV: &str = "hub_stats.csv";
/// Per-repository, per-directory totals.
pub const SUMMARY_CSV: &str = "hub_stats_summary.csv";

const DETAIL_HEADER: [&str; 5] = ["file", "row_count", "dir", "repo", "model_id"];
const SUMMARY_HEADER: [&str; 3] = ["repo", "dir", "row_count"];

/// Total rows for one (repository, directory) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub repo: String,
    pub dir: HubDirectory,
    pub row_count: i64,
}

/// Output of [`rebuild_reports`].
#[derive(Debug, Clone)]
pub struct RebuiltReports {
    pub detail_path: PathBuf,
    pub summary_path: PathBuf,
    pub detail: Vec<RowCount>,
    pub summary: Vec<SummaryRow>,
}

fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("file", DataType::Utf8, false),
        Field::new("row_count", DataType::Int64, false),
        Field::new("dir", DataType::Utf8, false),
        Field::new("repo", DataType::Utf8, false),
        Field::new("model_id", DataType::Utf8, true),
    ]))
}

/// Write a repository's rows to `{output_dir}/{repo}.parquet`, replacing any
/// previous file for that repository.
pub fn persist(rows: &[RowCount], repo: &HubRepo, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}.parquet", repo.name));

    let schema = schema();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.file.as_str()))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.row_count))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.dir.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.repo.as_str()))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.model_id.as_deref()))),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let file = File::create(&path)?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    if batch.num_rows() > 0 {
        writer.write(&batch)?;
    }
    writer.close()?;

    tracing::info!(path = %path.display(), rows = rows.len(), "Saved repository stats");
    Ok(path)
}

/// Read back a file written by [`persist`].
///
/// String columns may be `Utf8` or `LargeUtf8`; files with no rows are
/// accepted whatever their schema.
pub fn read_parquet(path: &Path) -> Result<Vec<RowCount>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        if batch.num_rows() == 0 {
            continue;
        }

        let files = string_column(&batch, "file", path)?;
        let dirs = string_column(&batch, "dir", path)?;
        let repos = string_column(&batch, "repo", path)?;
        let model_ids = string_column(&batch, "model_id", path)?;
        let counts = batch
            .column_by_name("row_count")
            .and_then(|c| c.as_primitive_opt::<Int64Type>())
            .ok_or_else(|| invalid(path, "row_count must be an Int64 column"))?;

        for i in 0..batch.num_rows() {
            let dir = dirs[i]
                .as_deref()
                .ok_or_else(|| invalid(path, "dir is null"))?
                .parse::<HubDirectory>()?;
            rows.push(RowCount {
                file: files[i].clone().ok_or_else(|| invalid(path, "file is null"))?,
                row_count: if counts.is_null(i) { 0 } else { counts.value(i) },
                dir,
                repo: repos[i].clone().ok_or_else(|| invalid(path, "repo is null"))?,
                model_id: model_ids[i].clone(),
            });
        }
    }

    Ok(rows)
}

fn string_column(batch: &RecordBatch, name: &str, path: &Path) -> Result<Vec<Option<String>>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| invalid(path, &format!("missing column {}", name)))?;

    if let Some(values) = column.as_string_opt::<i32>() {
        Ok(values.iter().map(|v| v.map(String::from)).collect())
    } else if let Some(values) = column.as_string_opt::<i64>() {
        Ok(values.iter().map(|v| v.map(String::from)).collect())
    } else if column.data_type() == &DataType::Null {
        // model_id of a hub with only target-data rows may be written untyped
        Ok(vec![None; column.len()])
    } else {
        Err(invalid(path, &format!("{} must be a string column", name)))
    }
}

fn invalid(path: &Path, message: &str) -> RepoUtilsError {
    RepoUtilsError::InvalidReport {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Group rows by (repository, directory), summing row counts.
///
/// Sorted by repository, then directory.
pub fn summarize(rows: &[RowCount]) -> Vec<SummaryRow> {
    let mut totals: BTreeMap<(&str, HubDirectory), i64> = BTreeMap::new();
    for row in rows {
        *totals.entry((row.repo.as_str(), row.dir)).or_default() += row.row_count;
    }
    totals
        .into_iter()
        .map(|((repo, dir), row_count)| SummaryRow {
            repo: repo.to_string(),
            dir,
            row_count,
        })
        .collect()
}

fn parquet_files(output_dir: &Path) -> Result<Vec<PathBuf>> {
    if !output_dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    files.sort();
    Ok(files)
}

fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Combine every `*.parquet` file in `output_dir` into the detail and summary CSVs.
///
/// Returns `None` when there is nothing to summarize.
pub fn rebuild_reports(output_dir: &Path) -> Result<Option<RebuiltReports>> {
    let files = parquet_files(output_dir)?;
    if files.is_empty() {
        tracing::warn!(
            dir = %output_dir.display(),
            "Cannot create .csv: no parquet files found, nothing to summarize"
        );
        return Ok(None);
    }

    let mut detail = Vec::new();
    for file in &files {
        detail.extend(read_parquet(file)?);
    }

    let detail_path = output_dir.join(DETAIL_CSV);
    write_csv(&detail_path, &DETAIL_HEADER, &detail)?;
    tracing::info!(path = %detail_path.display(), rows = detail.len(), "Saved hub details");

    let summary = summarize(&detail);
    let summary_path = output_dir.join(SUMMARY_CSV);
    write_csv(&summary_path, &SUMMARY_HEADER, &summary)?;
    tracing::info!(path = %summary_path.display(), rows = summary.len(), "Saved hub summaries");

    Ok(Some(RebuiltReports {
        detail_path,
        summary_path,
        detail,
        summary,
    }))
}

/// Render summary rows as an aligned console table.
pub fn format_summary(rows: &[SummaryRow]) -> String {
    let count_text: Vec<String> = rows.iter().map(|r| r.row_count.to_string()).collect();
    let repo_width = rows
        .iter()
        .map(|r| r.repo.len())
        .chain([SUMMARY_HEADER[0].len()])
        .max()
        .unwrap_or_default();
    let dir_width = rows
        .iter()
        .map(|r| r.dir.as_str().len())
        .chain([SUMMARY_HEADER[1].len()])
        .max()
        .unwrap_or_default();
    let count_width = count_text
        .iter()
        .map(String::len)
        .chain([SUMMARY_HEADER[2].len()])
        .max()
        .unwrap_or_default();

    let mut out = format!(
        "{:<repo_width$}  {:<dir_width$}  {:>count_width$}\n",
        SUMMARY_HEADER[0], SUMMARY_HEADER[1], SUMMARY_HEADER[2]
    );
    out.push_str(&format!(
        "{}  {}  {}\n",
        "-".repeat(repo_width),
        "-".repeat(dir_width),
        "-".repeat(count_width)
    ));
    for (row, count) in rows.iter().zip(&count_text) {
        out.push_str(&format!(
            "{:<repo_width$}  {:<dir_width$}  {:>count_width$}\n",
            row.repo,
            row.dir.as_str(),
            count
        ));
    }
    out
}
