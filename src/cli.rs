use clap::Parser;
use std::path::PathBuf;

/// Bulk COPY loader with dichotomic error recovery.
#[derive(Debug, Parser)]
#[command(name = "pgbulkload", version, about)]
pub struct Cli {
    /// Target table name.
    #[arg(long)]
    pub table: String,

    /// Column names, in order, matching each input row's fields.
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Input file; reads stdin when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// YAML configuration file. Falls back to PG* environment variables
    /// when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the reject log. Defaults to `<table>.reject.log`.
    #[arg(long)]
    pub reject_log: Option<PathBuf>,

    /// Validate without issuing mutating SQL.
    #[arg(long)]
    pub dry_run: bool,

    /// Truncate the target table before loading.
    #[arg(long)]
    pub truncate: bool,

    /// Vacuum the target table after loading.
    #[arg(long)]
    pub vacuum: bool,

    /// Disable triggers for the duration of the load.
    #[arg(long)]
    pub disable_triggers: bool,

    /// Overrides the config file's `client_min_messages` (e.g. `debug1`),
    /// controlling whether COPY buffers are saved before an attempt is made.
    #[arg(long)]
    pub client_min_messages: Option<String>,
}
