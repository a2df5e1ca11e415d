//! CLI command for migrating legacy tables

use std::path::Path;

use crate::migrate::migrate_legacy_with;
use crate::store::StoreLayout;

pub fn execute(root: &Path, legacy_extension: &str) -> anyhow::Result<()> {
    let layout = StoreLayout::new(root);
    let report = migrate_legacy_with(&layout, legacy_extension)?;

    if report.converted == 0 && report.failures.is_empty() {
        println!("No legacy .{legacy_extension} tables under {}", root.display());
        return Ok(());
    }

    println!("Migrated {} tables", report.converted);
    for (path, message) in &report.failures {
        eprintln!("  Failed {}: {message}", path.display());
    }

    if !report.failures.is_empty() {
        anyhow::bail!("{} tables could not be migrated", report.failures.len());
    }
    Ok(())
}
