//! CLI command for importing raw string tables

use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::cli::progress::{DISK, GEAR, LOOKING_GLASS, TRUCK, print_done, print_step, simple_bar};
use crate::import::{ImportOptions, import_batch};
use crate::migrate::migrate_legacy_with;
use crate::store::StoreLayout;

pub fn execute(
    inputs: &[PathBuf],
    root: &Path,
    threads: usize,
    legacy_extension: &str,
    quiet: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let layout = StoreLayout::new(root);
    layout.ensure_data_dirs()?;

    if !quiet {
        print_step(1, 4, TRUCK, "Checking for legacy tables...");
    }
    let report = migrate_legacy_with(&layout, legacy_extension)?;
    if !quiet && report.converted > 0 {
        println!("  Migrated {} legacy tables", report.converted);
    }
    for (path, message) in &report.failures {
        eprintln!("  Could not migrate {}: {message}", path.display());
    }

    if !quiet {
        print_step(2, 4, LOOKING_GLASS, "Collecting files...");
    }
    let files = collect_files(inputs)?;
    if files.is_empty() {
        println!("No files to import");
        return Ok(());
    }

    if !quiet {
        print_step(3, 4, GEAR, &format!("Importing {} files...", files.len()));
    }
    let pb = (!quiet).then(|| simple_bar(files.len() as u64, "Importing"));
    let options = ImportOptions::with_threads(threads);

    let result = import_batch(&layout, &files, &options, |progress| {
        if let Some(pb) = &pb {
            pb.set_position(progress.current as u64);
            if let Some(name) = &progress.current_file {
                pb.set_message(name.clone());
            }
        }
    })?;

    if let Some(pb) = &pb {
        pb.finish_with_message("done");
    }

    if !quiet {
        print_step(4, 4, DISK, "Summary");
        println!(
            "  {} tables updated ({} new), {} skipped",
            result.merged, result.created, result.skipped
        );
        println!(
            "  {} rows added, {} changed, {} unchanged",
            result.stats.added, result.stats.updated, result.stats.unchanged
        );
    }
    for (path, message) in &result.failures {
        eprintln!("  Failed {}: {message}", path.display());
    }

    if !quiet {
        print_done(started.elapsed());
    }

    if result.fail_count() > 0 {
        anyhow::bail!("{} of {} files failed to import", result.fail_count(), files.len());
    }
    Ok(())
}

/// Expand directories to the files below them
fn collect_files(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(input) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}
