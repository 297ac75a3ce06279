//! Per-file row counting.

use parquet::file::metadata::ParquetMetaDataReader;
use rayon::ThreadPool;
use rayon::prelude::*;

use crate::error::{RepoUtilsError, Result};
use crate::github::GitHubClient;
use crate::hubstats::{FileCount, FileRecord};

const PARQUET_FOOTER_LEN: usize = 8;
const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// Counts rows of remote CSV and Parquet files.
pub struct RowCounter<'a> {
    client: &'a GitHubClient,
}

impl<'a> RowCounter<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Count rows of one file. Never fails: errors are logged and counted as zero.
    pub fn count(&self, url: &str) -> FileCount {
        let file_name = file_name_from_url(url);
        let row_count = match self.try_count(url) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Error processing file, counting as 0");
                0
            }
        };
        FileCount {
            file_name,
            row_count,
        }
    }

    /// Count every record on the pool.
    pub fn count_all(&self, records: &[FileRecord], pool: &ThreadPool) -> Vec<FileCount> {
        pool.install(|| {
            records
                .par_iter()
                .map(|record| self.count(&record.url))
                .collect()
        })
    }

    fn try_count(&self, url: &str) -> Result<i64> {
        if url_path(url).ends_with(".parquet") {
            self.count_parquet(url)
        } else {
            self.count_text(url)
        }
    }

    /// Stored row count from the Parquet footer, without downloading data pages.
    fn count_parquet(&self, url: &str) -> Result<i64> {
        let footer = self.client.get_tail(url, PARQUET_FOOTER_LEN as u64)?;
        let metadata_len = parquet_metadata_len(&footer).map_err(|message| {
            RepoUtilsError::ParquetFooter {
                url: url.to_string(),
                message,
            }
        })?;

        let tail = self
            .client
            .get_tail(url, (metadata_len + PARQUET_FOOTER_LEN) as u64)?;
        if tail.len() < metadata_len + PARQUET_FOOTER_LEN {
            return Err(RepoUtilsError::ParquetFooter {
                url: url.to_string(),
                message: format!(
                    "expected {} metadata bytes, got {}",
                    metadata_len,
                    tail.len().saturating_sub(PARQUET_FOOTER_LEN)
                ),
            });
        }

        let end = tail.len() - PARQUET_FOOTER_LEN;
        let metadata = ParquetMetaDataReader::decode_metadata(&tail[end - metadata_len..end])?;
        Ok(metadata.file_metadata().num_rows())
    }

    /// Line count of a delimited text file, header included.
    fn count_text(&self, url: &str) -> Result<i64> {
        let text = self.client.get_text(url)?;
        Ok(count_lines(&text))
    }
}

/// Number of lines in `text`; a trailing newline does not start a new line.
pub fn count_lines(text: &str) -> i64 {
    text.lines().count() as i64
}

/// Length of the Thrift metadata block announced by a Parquet footer.
pub fn parquet_metadata_len(footer: &[u8]) -> std::result::Result<usize, String> {
    if footer.len() < PARQUET_FOOTER_LEN {
        return Err(format!("footer too short ({} bytes)", footer.len()));
    }
    let footer = &footer[footer.len() - PARQUET_FOOTER_LEN..];
    if &footer[4..] != PARQUET_MAGIC {
        return Err("missing PAR1 magic".to_string());
    }
    let len = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    Ok(len as usize)
}

/// Last path segment of a URL, ignoring any query string.
pub fn file_name_from_url(url: &str) -> String {
    url_path(url)
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn url_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    }
}
