//! hpc-helper CLI
//!
//! Command-line frontend for the FAU HPC helper utilities.

use clap::Parser;
use hpc_helper::config::{CliArgs, Commands, JobRequest, StatusFileAction, SubmitArgs, TargetSystem};
use hpc_helper::deploy::{ensure_deploy_target, DeployTarget};
use hpc_helper::error::{HpcError, Result};
use hpc_helper::scheduler::{JobContext, Scheduler, SchedulerKind};
use hpc_helper::status::{check_status_file, cleanup_status_files, write_status_file};
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => EnvFilter::from_default_env(),
        1 => EnvFilter::new("hpc_helper=debug"),
        _ => EnvFilter::new("hpc_helper=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    match &args.command {
        Commands::Submit(submit) => cmd_submit(submit, args.quiet),
        Commands::Jobs {
            pattern,
            scheduler,
            json,
        } => cmd_jobs(pattern, *scheduler, *json),
        Commands::Status { job_id, scheduler } => cmd_status(job_id, *scheduler),
        Commands::Cancel { job_id, scheduler } => cmd_cancel(job_id, *scheduler, args.quiet),
        Commands::Detect { json } => cmd_detect(*json),
        Commands::CheckEnv { deploy, system } => cmd_check_env(*deploy, *system, args.quiet),
        Commands::StatusFile { action } => cmd_status_file(action, args.quiet),
    }
}

fn scheduler_for(kind: Option<SchedulerKind>, system: TargetSystem) -> Result<Scheduler> {
    match kind {
        Some(kind) => Ok(Scheduler::new(kind, system)),
        None => Scheduler::detect(system),
    }
}

fn cmd_submit(args: &SubmitArgs, quiet: bool) -> Result<()> {
    let request = JobRequest::from_cli(args)?;
    let scheduler = scheduler_for(args.scheduler, args.system)?;

    if args.dry_run {
        println!("{}", scheduler.build_submit_command(&request)?);
        return Ok(());
    }

    let job_id = scheduler.submit(&request)?;
    if !quiet {
        println!("Submitted job {} ({})", job_id, request.job_name);
    }
    Ok(())
}

fn cmd_jobs(pattern: &str, kind: Option<SchedulerKind>, json: bool) -> Result<()> {
    let scheduler = scheduler_for(kind, TargetSystem::default())?;
    let jobs = scheduler.running_jobs(pattern)?;

    if json {
        let out = serde_json::to_string_pretty(&jobs).map_err(|e| HpcError::config(e.to_string()))?;
        println!("{}", out);
    } else if jobs.is_empty() {
        println!("No running jobs match '{}'", pattern);
    } else {
        for job in &jobs {
            println!("{}", job);
        }
    }
    Ok(())
}

fn cmd_status(job_id: &str, kind: Option<SchedulerKind>) -> Result<()> {
    let scheduler = scheduler_for(kind, TargetSystem::default())?;
    let status = scheduler.status(job_id)?;
    println!("{}", status);
    Ok(())
}

fn cmd_cancel(job_id: &str, kind: Option<SchedulerKind>, quiet: bool) -> Result<()> {
    let scheduler = scheduler_for(kind, TargetSystem::default())?;
    scheduler.cancel(job_id)?;
    if !quiet {
        println!("Cancelled job {}", job_id);
    }
    Ok(())
}

fn cmd_detect(json: bool) -> Result<()> {
    let context = JobContext::collect();

    if json {
        let out =
            serde_json::to_string_pretty(&context).map_err(|e| HpcError::config(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    match SchedulerKind::detect() {
        Some(kind) => println!("Scheduler: {}", kind),
        None => println!("Scheduler: none detected"),
    }

    if context.is_job() {
        println!("Job id:    {}", context.job_id.as_deref().unwrap_or("-"));
        println!("Job name:  {}", context.job_name.as_deref().unwrap_or("-"));
        if let Some(nodes) = context.num_nodes {
            println!("Nodes:     {}", nodes);
        }
        if let Some(tasks) = context.num_tasks {
            println!("Tasks:     {}", tasks);
        }
        if let Some(array) = &context.array {
            println!("Array:     {} task {}", array.array_job_id, array.task_id);
        }
    } else {
        println!("Not running inside a batch job");
    }
    Ok(())
}

fn cmd_check_env(deploy: DeployTarget, system: TargetSystem, quiet: bool) -> Result<()> {
    ensure_deploy_target(deploy, system)?;
    if !quiet {
        println!("Deploy environment ok ({})", deploy);
    }
    Ok(())
}

fn cmd_status_file(action: &StatusFileAction, quiet: bool) -> Result<()> {
    match action {
        StatusFileAction::Check { dir } => {
            let done = check_status_file(dir)?;
            if !quiet {
                println!("{}", if done { "done" } else { "pending" });
            }
            if !done {
                std::process::exit(1);
            }
            Ok(())
        }
        StatusFileAction::Write { dir, exit_status } => write_status_file(dir, *exit_status),
        StatusFileAction::Clean { dirs } => cleanup_status_files(dirs.iter()),
    }
}
