//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use clap::{Parser, Subcommand};

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

/// labcode-export - Export laboratory run data and metadata across storage backends.
#[derive(Parser, Debug)]
#[command(name = "labcode-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format: table or json.
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Path to the configuration file (defaults to ~/.labcode-export/config.toml).
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse the output format argument.
    ///
    /// # Errors
    /// Returns an error message for unrecognized formats.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        match self.format.as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown format: {other} (expected table or json)")),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List a run's content under a virtual-path prefix.
    List {
        /// Run ID.
        run_id: i64,

        /// Virtual path prefix to list under.
        #[arg(short, long, default_value = "")]
        prefix: String,
    },

    /// Preview a run's content (text, or base64 for binary).
    Preview {
        /// Run ID.
        run_id: i64,

        /// Virtual path of the content.
        path: String,
    },

    /// Resolve a download URL for a run/path.
    Url {
        /// Run ID.
        run_id: i64,

        /// Virtual path of the content.
        path: String,
    },

    /// Show storage backend info for a run.
    Info {
        /// Run ID.
        run_id: i64,
    },

    /// Export a single run's metadata snapshot as a SQLite file.
    Dump {
        /// Run ID.
        run_id: i64,

        /// Output file path (defaults to run_<id>_dump.db).
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Estimate the size of a batch download (advisory 500 MiB cap).
    Estimate {
        /// Run IDs, comma separated.
        #[arg(short, long, value_delimiter = ',', required = true)]
        runs: Vec<i64>,
    },

    /// Build a batch download archive for a set of runs.
    BatchDownload {
        /// Run IDs, comma separated.
        #[arg(short, long, value_delimiter = ',', required = true)]
        runs: Vec<i64>,

        /// Output archive path (defaults to the generated filename).
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Build a metadata-only dump archive for a set of runs.
    BatchDump {
        /// Run IDs, comma separated.
        #[arg(short, long, value_delimiter = ',', required = true)]
        runs: Vec<i64>,

        /// Output archive path (defaults to the generated filename).
        #[arg(short, long)]
        output: Option<String>,
    },
}
