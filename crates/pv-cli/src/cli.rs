//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use pv_core::StatementKind;

/// Provisio - provision a hosted Postgres schema over its HTTP API
#[derive(Parser, Debug)]
#[command(name = "pv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Named connection target from the config
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    /// Override the backend base URL
    #[arg(long, global = true, env = "PROVISIO_URL")]
    pub url: Option<String>,

    /// Override the schema definition file
    #[arg(short = 's', long, global = true)]
    pub schema_file: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply the schema, RLS policies, and seed data
    Install(InstallArgs),

    /// Print the rendered statement catalog
    Plan(PlanArgs),

    /// Check (and install) the execute-SQL procedure
    Probe,

    /// Read the verification table and report installation status
    Verify,
}

/// Arguments for the install command
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Render the plan without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Only print statements of this kind
    #[arg(short, long, value_enum)]
    pub kind: Option<KindFilter>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Progress bar and human-readable summary
    Text,
    /// One JSON object per line
    Json,
}

/// Statement kinds selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Enum,
    Table,
    Index,
    Rls,
    Policy,
    Seed,
}

impl From<KindFilter> for StatementKind {
    fn from(kind: KindFilter) -> Self {
        match kind {
            KindFilter::Enum => StatementKind::EnumType,
            KindFilter::Table => StatementKind::Table,
            KindFilter::Index => StatementKind::Index,
            KindFilter::Rls => StatementKind::RlsEnable,
            KindFilter::Policy => StatementKind::RlsPolicy,
            KindFilter::Seed => StatementKind::SeedData,
        }
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
