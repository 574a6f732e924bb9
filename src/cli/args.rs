//! Command-line argument parsing for connscope
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::formats::traits::DisplayFormat;
use crate::snapshot::SortField;

#[derive(Parser)]
#[command(name = "connscope")]
#[command(about = "Inspect network connections and the processes that own them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Replay a saved capture instead of reading the live connection table
    #[arg(short, long, value_name = "FILE", global = true)]
    pub capture: Option<std::path::PathBuf>,

    /// Additional process name to treat as a system process (repeatable)
    #[arg(long = "system-process", value_name = "NAME", global = true)]
    pub system_processes: Vec<String>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Enable verbose output (warnings, status messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the current connections, optionally filtered by process name
    List {
        /// Keep connections whose process name contains TEXT (case-insensitive)
        #[arg(short, long, value_name = "TEXT")]
        filter: Option<String>,

        #[command(flatten)]
        sort: SortArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: DisplayFormatArg,
    },

    /// Show only the connections owned by exactly PROCESS
    Drill {
        #[arg(value_name = "PROCESS")]
        process: String,

        #[command(flatten)]
        sort: SortArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: DisplayFormatArg,
    },

    /// Export selected connections; the format follows the extension (txt, csv, xlsx, html)
    Export {
        #[arg(value_name = "OUTPUT")]
        output: std::path::PathBuf,

        /// Keep connections whose process name contains TEXT (case-insensitive)
        #[arg(short, long, value_name = "TEXT", conflicts_with = "process")]
        filter: Option<String>,

        /// Keep only connections owned by exactly NAME
        #[arg(short, long, value_name = "NAME")]
        process: Option<String>,

        #[command(flatten)]
        sort: SortArgs,

        /// Record ids to export, as shown by `list`
        #[arg(short, long, value_name = "ID", num_args = 1.., required_unless_present = "all")]
        select: Vec<String>,

        /// Export every connection in the view
        #[arg(short, long, conflicts_with = "select")]
        all: bool,
    },

    /// Save the live connection table and process names to a JSON capture
    Capture {
        #[arg(value_name = "OUTPUT")]
        output: std::path::PathBuf,
    },

    /// Interactive session: refresh, sort, select and export in one snapshot
    Shell,
}

#[derive(Args, Clone, Copy)]
pub struct SortArgs {
    /// Sort each bucket by this column
    #[arg(long, value_enum, value_name = "FIELD")]
    pub sort: Option<SortFieldArg>,

    /// Sort in descending order
    #[arg(long, requires = "sort")]
    pub descending: bool,
}

impl SortArgs {
    pub fn order(&self) -> Option<(SortField, bool)> {
        self.sort.map(|field| (field.into(), !self.descending))
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum SortFieldArg {
    Local,
    Remote,
    Status,
    Process,
}

impl From<SortFieldArg> for SortField {
    fn from(arg: SortFieldArg) -> Self {
        match arg {
            SortFieldArg::Local => SortField::Local,
            SortFieldArg::Remote => SortField::Remote,
            SortFieldArg::Status => SortField::Status,
            SortFieldArg::Process => SortField::Process,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum DisplayFormatArg {
    Table,
    Json,
}

impl From<DisplayFormatArg> for DisplayFormat {
    fn from(arg: DisplayFormatArg) -> Self {
        match arg {
            DisplayFormatArg::Table => DisplayFormat::Table,
            DisplayFormatArg::Json => DisplayFormat::Json,
        }
    }
}
