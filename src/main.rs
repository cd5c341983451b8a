use std::path::PathBuf;

use clap::{Parser, Subcommand};

use relay::config::Config;
use relay::core::schema::Status;
use relay::parser::scan_plan_dir;
use relay::{rlog, Result, StatusManager};

/// Relay - plan-driven execution state engine
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RELAY_DEBUG=1    Enable debug logging (alternative to --debug)")]
struct Cli {
    /// Enable debug logging (writes to ~/.relay/relay.log)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Override the status file path from relay.toml
    #[arg(long, value_name = "FILE")]
    status_file: Option<PathBuf>,

    /// Override the plan directory from relay.toml
    #[arg(long, value_name = "DIR")]
    plan_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Scan plan documents and bootstrap the status file
    Init {
        /// Overwrite an existing status file
        #[arg(long)]
        force: bool,
    },

    /// Show execution progress
    Stat {
        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },

    /// Show the next pending job in schedule order
    Next,

    /// Show the currently running job
    Current,

    /// Apply a validated status transition to a job
    Set {
        module: String,
        job: String,
        /// PENDING, RUNNING, COMPLETED, FAILED, or BLOCKED
        status: Status,
    },

    /// Update one task inside a job
    Task {
        module: String,
        job: String,
        /// 1-based task index
        index: usize,
        status: Status,
    },

    /// Copy the status file to a timestamped backup
    Backup,

    /// Restore the status file from a backup
    Restore { path: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    relay::log::init_with_debug(cli.debug);

    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let status_file = cli.status_file.unwrap_or_else(|| config.status_file());
    let plan_dir = cli.plan_dir.unwrap_or_else(|| config.plan_dir());
    let manager = StatusManager::new(&status_file);

    match cli.command {
        Command::Init { force } => {
            if status_file.exists() && !force {
                eprintln!(
                    "Status file {} already exists. Use --force to regenerate.",
                    status_file.display()
                );
                std::process::exit(1);
            }
            let plans = scan_plan_dir(&plan_dir)?;
            manager.initialize(&plans)?;
            let snapshot = manager.snapshot()?;
            rlog!("Initialized status from {}", plan_dir.display());
            println!(
                "Initialized {}: {} modules, {} jobs",
                status_file.display(),
                snapshot.global.total_modules,
                snapshot.global.total_jobs
            );
            for module in &snapshot.modules {
                println!(
                    "  [{}] {} ({} jobs)",
                    module.index,
                    module.name,
                    module.jobs.len()
                );
            }
        }

        Command::Stat { json } => {
            load_or_explain(&manager)?;
            let summary = manager.summary()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Overall: {}", summary.status);
                println!(
                    "Jobs: {} total | {} completed | {} running | {} pending | {} failed | {} blocked",
                    summary.total_jobs,
                    summary.completed,
                    summary.running,
                    summary.pending,
                    summary.failed,
                    summary.blocked
                );
                for module in &summary.modules {
                    println!(
                        "  {:<24} {:<10} {}/{} done",
                        module.name,
                        module.status.to_string(),
                        module.completed,
                        module.total_jobs
                    );
                }
            }
        }

        Command::Next => {
            load_or_explain(&manager)?;
            match manager.next_pending_job()? {
                Some(job) => println!("{}/{} (global index {})", job.module, job.job, job.global_index),
                None => println!("No pending jobs."),
            }
        }

        Command::Current => {
            load_or_explain(&manager)?;
            match manager.current_job()? {
                Some(job) => println!("{}/{} is running", job.module, job.job),
                None => println!("No job is running."),
            }
        }

        Command::Set {
            module,
            job,
            status,
        } => {
            load_or_explain(&manager)?;
            manager.transition_job_status(&module, &job, status)?;
            println!("{}/{} -> {}", module, job, status);
        }

        Command::Task {
            module,
            job,
            index,
            status,
        } => {
            load_or_explain(&manager)?;
            manager.update_task_status(&module, &job, index, status)?;
            println!("{}/{} task {} -> {}", module, job, index, status);
        }

        Command::Backup => {
            let path = manager.backup()?;
            println!("Backup written to {}", path.display());
        }

        Command::Restore { path } => {
            manager.restore_from_backup(&path)?;
            println!("Restored from {}", path.display());
        }
    }

    Ok(())
}

/// Load the status file, telling the operator what to do when it is
/// missing instead of surfacing a raw error.
fn load_or_explain(manager: &StatusManager) -> Result<()> {
    manager.load()?;
    if !manager.is_loaded() {
        eprintln!(
            "No status file at {}. Run `relay init` first.",
            manager.file_path().display()
        );
        std::process::exit(1);
    }
    Ok(())
}
