//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod run;
mod workflows;

pub use run::RunArgs;

use anyhow::Result;
use clap::Subcommand;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Provision the pool and job, run workflows and collect their output
    Run(RunArgs),
    /// List the registered workflow types
    Workflows,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run::handle_run_command(args).await,
        Commands::Workflows => workflows::handle_workflows_command(),
    }
}
