//! CLI command for listing stored rows

use std::cmp::Reverse;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::formats::strs::Language;
use crate::store::{StoreLayout, load_table};

struct Row {
    key: String,
    value: String,
    stamp: DateTime<Utc>,
}

pub fn execute(
    root: &Path,
    language: Language,
    filter: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let layout = StoreLayout::new(root);
    let filter_lower = filter.map(str::to_lowercase);

    let mut rows = Vec::new();
    for path in layout.list_tables(language)? {
        let table = match load_table(&path) {
            Ok(table) => table,
            Err(e) => {
                eprintln!("Skipping {}: {e}", path.display());
                continue;
            }
        };
        for entry in &table.items {
            let matches = filter_lower
                .as_deref()
                .is_none_or(|query| entry.value.to_lowercase().contains(query));
            if !matches {
                continue;
            }
            rows.push(Row {
                key: table.row_key(entry.row),
                value: entry.value.clone(),
                stamp: entry.stamp,
            });
        }
    }

    if rows.is_empty() {
        println!("No {language} rows found in {}", root.display());
        return Ok(());
    }

    rows.sort_by(|a, b| (Reverse(a.stamp), &a.key).cmp(&(Reverse(b.stamp), &b.key)));

    let total = rows.len();
    for row in rows.iter().take(limit) {
        println!(
            "{}  {:<16} {}",
            row.stamp.format("%Y-%m-%d %H:%M:%S"),
            row.key,
            row.value.replace('\n', "\\n")
        );
    }
    if total > limit {
        println!("... and {} more", total - limit);
    }

    Ok(())
}
