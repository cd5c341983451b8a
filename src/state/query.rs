//! Read-only derived views over the status store.
//!
//! Each query is O(total jobs) over the current snapshot. Because storage
//! order already respects dependencies, "first pending in order" is a valid
//! next unit of work; the one extra check here is that a candidate's
//! cross-module prerequisites are COMPLETED, since those are advisory in
//! the dependency graph and enforced only at selection time.

use serde::Serialize;

use crate::core::scheduler::cross_module_prerequisite;
use crate::core::schema::{ExecutionStatus, Status};
use crate::error::Result;
use crate::state::manager::StatusManager;

/// Reference to a concrete job in the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRef {
    pub module: String,
    pub job: String,
    pub module_index: usize,
    pub job_index: usize,
    pub global_index: usize,
    pub status: Status,
}

/// Aggregate job counts for one module.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub status: Status,
    pub total_jobs: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
}

/// Aggregate job counts across the whole run, with per-module breakdown
/// in topological order.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub status: Status,
    pub total_modules: usize,
    pub total_jobs: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub modules: Vec<ModuleSummary>,
}

impl StatusManager {
    /// First PENDING job in stored (topological) order whose resolvable
    /// cross-module prerequisites are all COMPLETED. `None` when no such
    /// job remains.
    pub fn next_pending_job(&self) -> Result<Option<JobRef>> {
        self.with_status(|status| {
            for module in &status.modules {
                for job in &module.jobs {
                    if job.status != Status::Pending {
                        continue;
                    }
                    if cross_module_prereqs_met(status, &job.prerequisites) {
                        return Some(JobRef {
                            module: module.name.clone(),
                            job: job.name.clone(),
                            module_index: module.index,
                            job_index: job.index,
                            global_index: job.global_index,
                            status: job.status,
                        });
                    }
                }
            }
            None
        })
    }

    /// Resolve the global current-index pointers to the concrete job.
    /// `None` when no job is RUNNING.
    pub fn current_job(&self) -> Result<Option<JobRef>> {
        self.with_status(|status| {
            let module = status.modules.get(status.global.current_module_index)?;
            let job = module
                .jobs
                .iter()
                .find(|j| j.global_index == status.global.current_job_index)?;
            if job.status != Status::Running {
                return None;
            }
            Some(JobRef {
                module: module.name.clone(),
                job: job.name.clone(),
                module_index: module.index,
                job_index: job.index,
                global_index: job.global_index,
                status: job.status,
            })
        })
    }

    /// Aggregate counts globally and per module.
    pub fn summary(&self) -> Result<Summary> {
        self.with_status(|status| {
            let mut summary = Summary {
                status: status.global.status,
                total_modules: status.modules.len(),
                total_jobs: 0,
                pending: 0,
                running: 0,
                completed: 0,
                failed: 0,
                blocked: 0,
                modules: Vec::with_capacity(status.modules.len()),
            };

            for module in &status.modules {
                let mut per_module = ModuleSummary {
                    name: module.name.clone(),
                    status: module.status,
                    total_jobs: module.jobs.len(),
                    ..Default::default()
                };
                for job in &module.jobs {
                    match job.status {
                        Status::Pending => per_module.pending += 1,
                        Status::Running => per_module.running += 1,
                        Status::Completed => per_module.completed += 1,
                        Status::Failed => per_module.failed += 1,
                        Status::Blocked => per_module.blocked += 1,
                    }
                }
                summary.total_jobs += per_module.total_jobs;
                summary.pending += per_module.pending;
                summary.running += per_module.running;
                summary.completed += per_module.completed;
                summary.failed += per_module.failed;
                summary.blocked += per_module.blocked;
                summary.modules.push(per_module);
            }
            summary
        })
    }
}

/// Check a job's cross-module `module/job` prerequisites against the tree.
/// References that do not resolve are advisory display strings and are
/// ignored; resolvable ones must point at a COMPLETED job.
fn cross_module_prereqs_met(status: &ExecutionStatus, prerequisites: &[String]) -> bool {
    prerequisites.iter().all(|raw| {
        match cross_module_prerequisite(raw) {
            Some((module, job)) => match status
                .module_by_name(module)
                .and_then(|m| m.job_by_name(job))
            {
                Some(prereq_job) => prereq_job.status == Status::Completed,
                None => true,
            },
            None => true,
        }
    })
}
