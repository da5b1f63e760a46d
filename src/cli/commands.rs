use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vmdk_sweep::ActionMode;

#[derive(Debug, Parser)]
#[command(name = "vmdk-sweep")]
#[command(about = "Find and act on orphaned virtual machine disk files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile datastore disk files in a location against VM disk usage
    Sweep(SweepArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Platform endpoint (inventory root directory)
    #[arg(short, long)]
    pub server: PathBuf,
    /// Location whose datastores are searched
    #[arg(short, long)]
    pub location: String,
    /// What to do with orphans: report, rename or delete (case-insensitive)
    #[arg(short, long)]
    pub action: ActionMode,
    /// Directory for the CSV report
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Skip the confirmation prompt for delete
    #[arg(short, long)]
    pub yes: bool,
}
