//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Download manga chapters into CBZ archives.
///
/// Settings come from the environment (`MANGADEX_BASE_URL`, `LIBRARY_ROOT`,
/// `KOMGA_*`, ...); flags given here override them.
#[derive(Parser, Debug)]
#[command(name = "mangadl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download chapters of a title and print the finished job as JSON
    Download(DownloadArgs),
    /// Search titles by name
    Search {
        /// Title to search for
        title: String,
    },
}

/// Arguments for `mangadl download`.
#[derive(ClapArgs, Debug)]
pub struct DownloadArgs {
    /// Title id
    pub manga_id: String,

    /// Translation language (defaults to LANGUAGE, then "en")
    #[arg(short, long)]
    pub language: Option<String>,

    /// Volume to include (repeatable or comma-separated)
    #[arg(long = "volume", value_delimiter = ',')]
    pub volumes: Vec<String>,

    /// Chapter to include (repeatable or comma-separated); exactly two
    /// numbers select an inclusive range
    #[arg(long = "chapter", value_delimiter = ',')]
    pub chapters: Vec<String>,

    /// Library root directory (overrides LIBRARY_ROOT)
    #[arg(long)]
    pub library_root: Option<PathBuf>,

    /// Staging directory for archives (overrides WORK_DIR)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Prefer reduced-quality images (overrides USE_DATASAVER)
    #[arg(long)]
    pub data_saver: bool,

    /// Do not trigger a library scan when the job ends (overrides AUTO_SCAN)
    #[arg(long)]
    pub no_auto_scan: bool,
}
