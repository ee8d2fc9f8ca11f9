//! CLI definitions for bootstrap-config
//!
//! The binary merges INI sources into the process-wide store and prints
//! the requested part of it as JSON.

use clap::{Parser, ValueEnum};

/// What to do when `--class` cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ClassMode {
    /// Exit with an error (default)
    #[default]
    Strict,
    /// Warn and continue
    Lenient,
}

/// Inspect and merge INI configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// INI files (searched on the include path) or INI text, merged in order
    pub sources: Vec<String>,

    /// Also merge an INI document read from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Give up reading stdin after this many milliseconds
    #[arg(long, default_value_t = 5000)]
    pub stdin_timeout_ms: u64,

    /// Local include path, searched after the global include path
    #[arg(short = 'I', long)]
    pub include_path: Option<String>,

    /// Print only this top-level key
    #[arg(short, long, conflicts_with_all = ["path", "peek"])]
    pub key: Option<String>,

    /// Print only this nested path, segments separated by '/' (e.g. servers/script)
    #[arg(short, long, value_delimiter = '/', conflicts_with = "peek")]
    pub path: Vec<String>,

    /// List the top-level keys instead of printing values
    #[arg(long)]
    pub peek: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Export scalar settings as constants and report how many were defined
    #[arg(long)]
    pub export_constants: bool,

    /// Resolve a class name and print the file it maps to
    #[arg(long)]
    pub class: Option<String>,

    /// Behaviour when --class cannot be resolved
    #[arg(long, value_enum, default_value_t = ClassMode::Strict)]
    pub class_mode: ClassMode,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2")]
    pub log: String,
}
