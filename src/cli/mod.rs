pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};

/// Tamper-evident audit trail: record, query, report, verify.
#[derive(Parser, Debug)]
#[command(name = "nuaa-audit", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Audit log directory (overrides config file and NUAA_AUDIT_DIR)
    #[arg(long, global = true)]
    pub dir: Option<String>,

    /// Path to a TOML config file with an [audit] table
    #[arg(long, global = true, env = "NUAA_AUDIT_CONFIG")]
    pub config: Option<String>,

    /// Verbose output (debug-level diagnostics)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append an event to the audit log
    Record(RecordArgs),

    /// Search the audit log
    Query(QueryArgs),

    /// Print a compliance report as JSON
    Report {
        /// Start of the reporting period (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,
        /// End of the reporting period (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        until: Option<String>,
    },

    /// Verify the hash chain of the audit log
    Verify {
        /// Log file to verify (default: the live log)
        #[arg(long, conflicts_with = "all")]
        file: Option<String>,
        /// Verify the live log and every rotated log
        #[arg(long)]
        all: bool,
    },

    /// Export events to JSON or CSV
    Export {
        /// Output format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Destination file
        #[arg(long, short)]
        output: String,
        /// Include rotated logs
        #[arg(long)]
        all: bool,
    },

    /// Show the effective configuration
    Config,
}

#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    /// Event type, e.g. document.created or auth.failure
    #[arg(long = "type")]
    pub event_type: String,
    /// debug, info, warning, error or critical
    #[arg(long, default_value = "info")]
    pub severity: String,
    /// Acting user (default: $USER)
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub action: Option<String>,
    /// Path of the affected resource
    #[arg(long)]
    pub resource: Option<String>,
    /// Kind of the affected resource
    #[arg(long, default_value = "document")]
    pub resource_type: String,
    #[arg(long)]
    pub description: Option<String>,
    /// success, failure or error
    #[arg(long, default_value = "success")]
    pub status: String,
    /// Extra metadata as key=value (repeatable)
    #[arg(long = "meta")]
    pub meta: Vec<String>,
    /// The event carries personally identifiable information
    #[arg(long)]
    pub pii: bool,
    /// The event touches sensitive data
    #[arg(long)]
    pub sensitive: bool,
}

#[derive(clap::Args, Debug)]
pub struct QueryArgs {
    /// Filter by event type (repeatable)
    #[arg(long = "type")]
    pub event_types: Vec<String>,
    /// Filter by severity (repeatable)
    #[arg(long = "severity")]
    pub severities: Vec<String>,
    /// Filter by username
    #[arg(long)]
    pub user: Option<String>,
    /// Filter by resource path (* wildcards)
    #[arg(long)]
    pub resource: Option<String>,
    #[arg(long)]
    pub action: Option<String>,
    /// success, failure or error
    #[arg(long)]
    pub status: Option<String>,
    /// Only events at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub since: Option<String>,
    /// Only events at or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub until: Option<String>,
    /// Show at most N entries
    #[arg(long)]
    pub limit: Option<usize>,
    /// Skip the first N matches
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
    /// Oldest first
    #[arg(long)]
    pub asc: bool,
    /// Include rotated logs
    #[arg(long)]
    pub all: bool,
    /// Print matches as JSON lines instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}
