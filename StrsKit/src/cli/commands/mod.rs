use clap::Subcommand;
use std::path::PathBuf;

use crate::formats::strs::Language;

pub mod execute;
pub mod import;
pub mod inspect;
pub mod list;
pub mod migrate;

#[derive(Subcommand)]
pub enum Commands {
    /// Merge raw string tables into the store (migrates legacy tables first)
    Import {
        /// Raw string table files; directories are searched recursively
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Store root (defaults to the configured root)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Convert legacy tables to the current store format
    Migrate {
        /// Store root (defaults to the configured root)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// List stored rows of one language, most recently changed first
    List {
        /// Language name or code (English, Korean, French, German, Spanish, Chinese or 0-5)
        #[arg(short, long)]
        language: Language,

        /// Only rows whose text contains this (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Maximum number of rows to print
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,

        /// Store root (defaults to the configured root)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Decode a raw string table and print its rows
    Inspect {
        /// Raw string table file
        file: PathBuf,
    },
}
