//! Parallel batch import

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use super::{ImportOutcome, import_file};
use crate::error::Result;
use crate::merge::MergeStats;
use crate::store::{StoreLayout, TableLocks};

/// Settings for [`import_batch`]
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Worker threads; 0 uses one per CPU
    pub threads: usize,
    /// Set to stop the batch before its next file
    pub cancel: Arc<AtomicBool>,
    /// Table locks shared with any other import running against the same store
    pub locks: Arc<TableLocks>,
    /// Stamp for every change in the batch; defaults to the start of the batch
    pub timestamp: Option<DateTime<Utc>>,
}

impl ImportOptions {
    #[must_use]
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }
}

/// Progress information during a batch import
#[derive(Debug, Clone)]
pub struct ImportProgress {
    /// Current file number (1-indexed)
    pub current: usize,
    /// Total number of files
    pub total: usize,
    /// File being imported
    pub current_file: Option<String>,
}

impl ImportProgress {
    #[must_use]
    pub fn with_file(current: usize, total: usize, file: impl Into<String>) -> Self {
        Self {
            current,
            total,
            current_file: Some(file.into()),
        }
    }

    /// Get the progress as a fraction in 0.0..=1.0
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Summary of a batch import
#[derive(Debug, Clone, Default)]
pub struct BatchImportResult {
    /// Files merged into a table
    pub merged: usize,
    /// Of those, tables imported for the first time
    pub created: usize,
    /// Files with no text rows
    pub skipped: usize,
    /// Files not started because the batch was cancelled
    pub cancelled: usize,
    /// Files that failed, with the reason
    pub failures: Vec<(PathBuf, String)>,
    /// Row counts summed over all merged files
    pub stats: MergeStats,
}

impl BatchImportResult {
    #[must_use]
    pub fn fail_count(&self) -> usize {
        self.failures.len()
    }
}

enum FileResult {
    Done(ImportOutcome),
    Cancelled,
    Failed(PathBuf, String),
}

/// Import many raw table files in parallel
///
/// Files are independent: a failing file is recorded and the rest continue.
/// Cancellation is checked before each file, so a file is either fully
/// imported or not touched.
///
/// # Errors
/// Returns an error only if the worker pool cannot be started.
pub fn import_batch<F>(
    layout: &StoreLayout,
    files: &[PathBuf],
    options: &ImportOptions,
    progress: F,
) -> Result<BatchImportResult>
where
    F: Fn(&ImportProgress) + Send + Sync,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()?;
    let timestamp = options.timestamp.unwrap_or_else(Utc::now);
    let processed = AtomicUsize::new(0);
    let total = files.len();

    tracing::info!(
        "Importing {total} files with {} workers",
        pool.current_num_threads()
    );

    let results: Vec<FileResult> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                if options.cancel.load(Ordering::SeqCst) {
                    return FileResult::Cancelled;
                }

                let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                progress(&ImportProgress::with_file(current, total, display_name(path)));

                match import_file(layout, &options.locks, path, timestamp) {
                    Ok(outcome) => FileResult::Done(outcome),
                    Err(e) => {
                        tracing::warn!("Failed to import {}: {e}", path.display());
                        FileResult::Failed(path.clone(), e.to_string())
                    }
                }
            })
            .collect()
    });

    let mut summary = BatchImportResult::default();
    for result in results {
        match result {
            FileResult::Done(ImportOutcome::Skipped) => summary.skipped += 1,
            FileResult::Done(ImportOutcome::Merged { created, stats, .. }) => {
                summary.merged += 1;
                summary.created += usize::from(created);
                summary.stats.added += stats.added;
                summary.stats.updated += stats.updated;
                summary.stats.unchanged += stats.unchanged;
            }
            FileResult::Cancelled => summary.cancelled += 1,
            FileResult::Failed(path, message) => summary.failures.push((path, message)),
        }
    }

    tracing::info!(
        "Batch import finished: {} merged, {} skipped, {} failed, {} cancelled",
        summary.merged,
        summary.skipped,
        summary.fail_count(),
        summary.cancelled
    );
    Ok(summary)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .to_string()
}
