//! CLI command for inspecting a raw string table

use std::path::Path;

use chrono::Utc;

use crate::formats::strs::read_strs;

pub fn execute(file: &Path) -> anyhow::Result<()> {
    let table = read_strs(file, Utc::now())?;

    if table.is_empty() {
        println!("{}: no text rows (not a string table?)", file.display());
        return Ok(());
    }

    println!("Table: {}", table.source_name);
    println!("Language: {}", table.language);
    println!("Text rows: {}", table.len());
    println!();
    for entry in &table.items {
        println!("{:>6}  {}", entry.row, entry.value.replace('\n', "\\n"));
    }

    Ok(())
}
