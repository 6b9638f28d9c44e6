//! Parallel per-file decoding

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::decode::Decoder;
use super::error::{DecodeError, IngestError};
use crate::models::DataTable;

/// Maximum number of failures kept verbatim in a report
const MAX_REPORTED_FAILURES: usize = 100;

/// A file that decoded successfully
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub path: PathBuf,
    pub table: DataTable,
}

impl DecodedFile {
    pub fn columns(&self) -> &[String] {
        self.table.columns()
    }
}

/// A file that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Diagnostics from an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Number of files handed to the decoders
    pub files_attempted: usize,
    /// Number of files that decoded without error
    pub files_decoded: usize,
    /// Number of decoded files whose headers matched the reference header
    pub files_kept: usize,
    /// Number of decoded files excluded because their headers differed
    pub files_excluded: usize,
    /// Rows in the reconciled table
    pub rows_ingested: usize,
    /// Total number of failures
    pub failures_count: usize,
    /// Failures (limited to the first 100)
    pub failures: Vec<FileFailure>,
    /// Wall-clock time spent decoding and reconciling
    #[serde(skip)]
    pub duration: Duration,
}

impl IngestReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure (the list is limited to 100 entries)
    pub fn add_failure(&mut self, failure: FileFailure) {
        self.failures_count += 1;
        if self.failures.len() < MAX_REPORTED_FAILURES {
            self.failures.push(failure);
        }
    }

    /// Rows per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rows_ingested as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// Result of the decode stage: successes, failures and the running report
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub results: Vec<DecodedFile>,
    pub report: IngestReport,
}

impl IngestOutcome {
    /// Failures recorded so far
    pub fn failures(&self) -> &[FileFailure] {
        &self.report.failures
    }
}

/// Decodes many files concurrently on a dedicated worker pool
///
/// Each file is decoded independently. A decode error or a panic inside the
/// decoder only drops that file; it is recorded in the report and logged.
#[derive(Debug, Clone)]
pub struct ParallelIngestor {
    workers: usize,
    progress: bool,
}

impl ParallelIngestor {
    /// Create an ingestor using `workers` threads (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress: false,
        }
    }

    /// Show a progress bar on stderr while decoding
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Decode every path with `decoder`
    ///
    /// Result order is not guaranteed to follow input order.
    pub fn ingest(
        &self,
        paths: &[PathBuf],
        decoder: &Decoder,
    ) -> Result<IngestOutcome, IngestError> {
        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("bulk-load-decode-{}", i))
            .build()
            .map_err(|e| IngestError::WorkerPool(e.to_string()))?;

        let progress = self.progress_bar(paths.len());
        info!(files = paths.len(), workers = self.workers, "Decoding files");

        let decoded: Vec<Result<DecodedFile, FileFailure>> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    let result = decode_isolated(path, decoder);
                    progress.inc(1);
                    result
                })
                .collect()
        });
        progress.finish_and_clear();

        let mut outcome = IngestOutcome::default();
        outcome.report.files_attempted = paths.len();
        for result in decoded {
            match result {
                Ok(file) => outcome.results.push(file),
                Err(failure) => {
                    warn!(
                        path = %failure.path.display(),
                        reason = %failure.reason,
                        "Skipping file that failed to decode"
                    );
                    outcome.report.add_failure(failure);
                }
            }
        }
        outcome.report.files_decoded = outcome.results.len();
        outcome.report.duration = start.elapsed();

        debug!(
            decoded = outcome.report.files_decoded,
            failed = outcome.report.failures_count,
            "Decode stage finished"
        );
        Ok(outcome)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let template = "{spinner:.green} [{elapsed_precise}] [{wide_bar}] {pos}/{len} ({eta})";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// Decode one file, turning errors and panics into a [`FileFailure`]
fn decode_isolated(path: &Path, decoder: &Decoder) -> Result<DecodedFile, FileFailure> {
    let result = catch_unwind(AssertUnwindSafe(|| decoder(path))).unwrap_or_else(|payload| {
        Err(DecodeError::Panicked {
            path: path.to_path_buf(),
            message: panic_message(payload.as_ref()),
        })
    });

    match result {
        Ok(table) => Ok(DecodedFile {
            path: path.to_path_buf(),
            table,
        }),
        Err(e) => Err(FileFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::decode::decoder_fn;
    use crate::models::Value;

    fn one_row_decoder() -> Decoder {
        decoder_fn(|path: &Path| {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if name.starts_with("bad") {
                return Err(DecodeError::parse(path, "malformed"));
            }
            if name.starts_with("boom") {
                panic!("decoder exploded");
            }
            Ok(DataTable::new(vec!["name".to_string()], vec![vec![Value::from(name)]]).unwrap())
        })
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/data/{}", n))).collect()
    }

    #[test]
    fn test_ingest_all_files() {
        let outcome = ParallelIngestor::new(4)
            .ingest(&paths(&["a", "b", "c"]), &one_row_decoder())
            .unwrap();
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.failures().is_empty());
        assert_eq!(outcome.report.files_attempted, 3);
    }

    #[test]
    fn test_failures_are_isolated() {
        let outcome = ParallelIngestor::new(2)
            .ingest(&paths(&["a", "bad1", "b"]), &one_row_decoder())
            .unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.report.failures_count, 1);
        assert_eq!(outcome.failures()[0].path, PathBuf::from("/data/bad1"));
        assert!(outcome.failures()[0].reason.contains("malformed"));
    }

    #[test]
    fn test_panicking_decoder_is_isolated() {
        let outcome = ParallelIngestor::new(2)
            .ingest(&paths(&["boom", "a"]), &one_row_decoder())
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.failures().len(), 1);
        assert!(outcome.failures()[0].reason.contains("decoder exploded"));
    }

    #[test]
    fn test_every_failure_is_listed() {
        let names: Vec<String> = (0..5).map(|i| format!("bad{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let outcome = ParallelIngestor::new(3)
            .ingest(&paths(&refs), &one_row_decoder())
            .unwrap();
        assert!(outcome.results.is_empty());
        let mut failed: Vec<_> = outcome.failures().iter().map(|f| f.path.clone()).collect();
        failed.sort();
        assert_eq!(failed, paths(&refs));
    }

    #[test]
    fn test_report_caps_failure_list() {
        let mut report = IngestReport::new();
        for i in 0..150 {
            report.add_failure(FileFailure {
                path: PathBuf::from(format!("/f{}", i)),
                reason: "x".to_string(),
            });
        }
        assert_eq!(report.failures_count, 150);
        assert_eq!(report.failures.len(), 100);
    }

    #[test]
    fn test_zero_workers_clamped() {
        assert_eq!(ParallelIngestor::new(0).workers(), 1);
    }

    #[test]
    fn test_duration_string() {
        let report = IngestReport {
            duration: Duration::from_secs(3725),
            ..Default::default()
        };
        assert_eq!(report.duration_string(), "1h 2m 5s");
    }
}
