//! Session command handler
//!
//! Builds an engine for the requested pool, adds the requested workflows
//! and runs one session. Ctrl-C cancels a session waiting on its tasks.

use anyhow::{Result, bail};
use batchflow_core::domain::session::SessionReport;
use batchflow_core::domain::task::TaskOutcome;
use batchflow_core::domain::workflow::WorkflowType;
use batchflow_engine::{EngineKind, ExecutionRequest, WorkflowEngine};
use clap::Args;
use colored::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Services;

/// Arguments of `batchflow run`
#[derive(Args)]
pub struct RunArgs {
    /// What the pool nodes run
    #[arg(long, env = "BATCHFLOW_ENGINE", default_value = "kubernetes")]
    engine: String,

    /// Pool to create or reuse
    #[arg(long, env = "BATCHFLOW_POOL_ID", default_value = "TES-BATCH-POOL-01")]
    pool: String,

    /// Job to create or reuse (default: batchflow-job-<uuid>)
    #[arg(long)]
    job: Option<String>,

    /// Workflow type to run; repeat to run several, in order
    #[arg(short, long = "workflow", required = true)]
    workflows: Vec<String>,

    /// Pool metadata entry
    #[arg(long = "pool-meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pool_meta: Vec<(String, String)>,

    /// Job metadata entry
    #[arg(long = "job-meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    job_meta: Vec<(String, String)>,

    /// Delete the job when the session ends
    #[arg(long)]
    delete_job: bool,

    /// Delete the pool when the session ends
    #[arg(long)]
    delete_pool: bool,

    /// Overrides AZURE_BATCH_JOB_TIMEOUT (1 to 10080 minutes)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_MINUTES))]
    timeout_minutes: Option<u64>,

    /// Print the session report as JSON
    #[arg(long)]
    json: bool,
}

/// One week
const MAX_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", input)),
    }
}

impl RunArgs {
    fn request(&self) -> ExecutionRequest {
        let job_id = self
            .job
            .clone()
            .unwrap_or_else(|| format!("batchflow-job-{}", Uuid::new_v4()));

        let mut request = ExecutionRequest::new(job_id)
            .with_pool_metadata(self.pool_meta.iter().cloned().collect::<BTreeMap<_, _>>())
            .with_job_metadata(self.job_meta.iter().cloned().collect::<BTreeMap<_, _>>())
            .delete_job_on_exit(self.delete_job)
            .delete_pool_on_exit(self.delete_pool);

        if let Some(minutes) = self.timeout_minutes {
            request = request.with_timeout(Duration::from_secs(minutes * 60));
        }
        request
    }
}

pub async fn handle_run_command(args: RunArgs) -> Result<()> {
    let kind: EngineKind = args.engine.parse()?;
    let services = Services::from_env()?;

    let mut engine = WorkflowEngine::new(
        kind,
        args.pool.clone(),
        Arc::clone(&services.config),
        Arc::clone(&services.registry),
        services.compute.clone(),
        Arc::clone(&services.locator),
    );
    for name in &args.workflows {
        engine.add_workflow(&WorkflowType::new(name.as_str()))?;
    }

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling session");
            cancel.cancel();
        }
    });

    let request = args.request();
    info!(
        "Running {} workflow(s) as job {} on pool {}",
        args.workflows.len(),
        request.job_id,
        engine.pool_id()
    );

    match engine.execute_workflow(&request).await {
        Ok(report) => {
            print_report(&report, args.json)?;
            let failed = report.failed_tasks().count();
            if failed > 0 {
                bail!("{} task(s) did not succeed", failed);
            }
            Ok(())
        }
        Err(failure) => {
            print_report(&failure.report, args.json)?;
            Err(failure.into())
        }
    }
}

fn print_report(report: &SessionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}", "Session:".bold());
    println!("  Job:   {}", report.job_id.cyan());
    println!("  Pool:  {}", report.pool_id.cyan());
    println!("  State: {}", report.state);
    if let Some(pool) = &report.pool {
        println!(
            "  Nodes: {} dedicated, {} low-priority ({})",
            pool.dedicated_nodes,
            pool.low_priority_nodes,
            if pool.created { "created" } else { "existing" }
        );
    }

    if report.tasks.is_empty() {
        if !report.submitted.is_empty() {
            println!(
                "\n{}",
                format!("{} task(s) submitted, none collected.", report.submitted.len()).yellow()
            );
        }
    } else {
        println!();
        for task in &report.tasks {
            print_task(task);
        }
    }

    for issue in &report.teardown {
        println!(
            "{} {:?} {}: {}",
            "⚠".yellow(),
            issue.target,
            issue.id,
            issue.message.dimmed()
        );
    }

    Ok(())
}

fn print_task(task: &TaskOutcome) {
    let status = if task.succeeded() {
        "✓".green()
    } else {
        "✗".red()
    };

    println!("{}", "─".repeat(80).dimmed());
    println!("{} Task {}", status, task.id.bold());
    println!("  CommandLine: {}", task.command_line.dimmed());
    println!("  Node:        {}", task.node_id.as_deref().unwrap_or("-"));
    if let Some(code) = task.exit_code {
        println!("  Exit code:   {}", code);
    }
    if let Some(failure) = &task.failure {
        println!(
            "  Failure:     {} {}: {}",
            failure.category.red(),
            failure.code.as_deref().unwrap_or("-"),
            failure.message.as_deref().unwrap_or("")
        );
        for detail in &failure.details {
            println!("    {} = {}", detail.name, detail.value);
        }
    }
    println!("  {}", "Standard error =>".dimmed());
    println!("{}", task.stderr);
    println!("  {}", "Standard out =>".dimmed());
    println!("{}", task.stdout);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("owner=lab").unwrap(),
            ("owner".to_string(), "lab".to_string())
        );
        assert_eq!(
            parse_key_value("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_request_from_args() {
        let cli = TestCli::parse_from([
            "batchflow",
            "-w",
            "get-k8s-details",
            "--workflow",
            "tesk-deploy",
            "--job",
            "job-1",
            "--job-meta",
            "owner=lab",
            "--delete-job",
            "--timeout-minutes",
            "2",
        ]);

        assert_eq!(cli.run.workflows, vec!["get-k8s-details", "tesk-deploy"]);
        let request = cli.run.request();
        assert_eq!(request.job_id, "job-1");
        assert_eq!(request.job_metadata["owner"], "lab");
        assert!(request.pool_metadata.is_empty());
        assert!(request.delete_job_on_exit);
        assert!(!request.delete_pool_on_exit);
        assert_eq!(request.timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_default_job_name() {
        let cli = TestCli::parse_from(["batchflow", "-w", "tesk-verify"]);
        let request = cli.run.request();
        assert!(request.job_id.starts_with("batchflow-job-"));
        assert_eq!(request.timeout, None);
    }

    #[test]
    fn test_timeout_out_of_range_is_rejected() {
        for minutes in ["0", "10081", "18446744073709551615"] {
            let parsed = TestCli::try_parse_from([
                "batchflow",
                "-w",
                "tesk-verify",
                "--timeout-minutes",
                minutes,
            ]);
            assert!(parsed.is_err(), "accepted --timeout-minutes {}", minutes);
        }

        let cli = TestCli::parse_from(["batchflow", "-w", "tesk-verify", "--timeout-minutes", "10080"]);
        assert_eq!(cli.run.request().timeout, Some(Duration::from_secs(10080 * 60)));
    }
}
