//! Workflow listing

use anyhow::Result;
use colored::*;

use crate::config::Services;

pub fn handle_workflows_command() -> Result<()> {
    let services = Services::from_env()?;
    let types: Vec<_> = services.registry.registered_types().collect();

    if types.is_empty() {
        println!("{}", "No workflow types registered.".yellow());
        return Ok(());
    }

    println!("{}", format!("{} workflow type(s):", types.len()).bold());
    for workflow_type in types {
        println!("  {} {}", "▸".cyan(), workflow_type);
    }

    Ok(())
}
