//! Status schema for the execution state engine.
//!
//! These types mirror the persisted `status.json` layout exactly: a root
//! [`ExecutionStatus`] holding global bookkeeping plus a topologically
//! ordered array of modules, each holding an ordered array of jobs with
//! their task checklists.
//!
//! Module status and per-job `tasks_completed` are derived values. They are
//! recomputed from child state on every relevant mutation and never treated
//! as independently writable truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version written to new status files.
pub const SCHEMA_VERSION: &str = "2.0";

/// Execution status of a task, job, module, or the whole run.
///
/// Serialized as the uppercase wire strings (`"PENDING"` etc). Any other
/// string fails deserialization, which is how corrupt status values are
/// rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Waiting to start.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished with an error. Retryable via FAILED -> PENDING.
    Failed,
    /// Cannot proceed until unblocked.
    Blocked,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Running => "RUNNING",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
            Status::Blocked => "BLOCKED",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Status::Pending),
            "RUNNING" => Ok(Status::Running),
            "COMPLETED" => Ok(Status::Completed),
            "FAILED" => Ok(Status::Failed),
            "BLOCKED" => Ok(Status::Blocked),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// One checklist item inside a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    /// 1-based position within the job.
    pub index: usize,
    pub status: Status,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

/// Free-form diagnostic record attached to a job. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugLogEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A unit of executable work within a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    /// Position within the module, post topological sort.
    pub index: usize,
    /// Dense position across the whole flattened schedule.
    pub global_index: usize,
    pub name: String,
    pub status: Status,
    /// Raw prerequisite references as authored (`job_N` or `module/job`).
    /// Retained for display after scheduling resolves them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
    pub tasks_total: usize,
    pub tasks_completed: usize,
    pub loop_count: u32,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debug_log: Vec<DebugLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    /// Count of tasks currently COMPLETED. The authoritative source for
    /// `tasks_completed`.
    pub fn completed_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == Status::Completed)
            .count()
    }

    /// Recompute `tasks_completed` from the task list. Idempotent.
    pub fn recount_tasks(&mut self) {
        self.tasks_completed = self.completed_task_count();
    }
}

/// A named group of jobs, typically one plan document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleState {
    /// Final topological position.
    pub index: usize,
    /// Stable identifier, derived from the plan filename.
    pub name: String,
    /// Human label; may differ from `name`.
    pub display_name: String,
    /// Which plan document produced this module.
    pub source_file: String,
    pub status: Status,
    /// Module-name dependency list as authored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    pub jobs: Vec<JobState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModuleState {
    /// Derive the module status from its jobs.
    ///
    /// Precedence: all COMPLETED -> COMPLETED; any RUNNING -> RUNNING;
    /// any FAILED -> FAILED; any BLOCKED -> BLOCKED; otherwise PENDING.
    /// A module with no jobs stays PENDING.
    pub fn derived_status(&self) -> Status {
        if !self.jobs.is_empty() && self.jobs.iter().all(|j| j.status == Status::Completed) {
            return Status::Completed;
        }
        if self.jobs.iter().any(|j| j.status == Status::Running) {
            return Status::Running;
        }
        if self.jobs.iter().any(|j| j.status == Status::Failed) {
            return Status::Failed;
        }
        if self.jobs.iter().any(|j| j.status == Status::Blocked) {
            return Status::Blocked;
        }
        Status::Pending
    }

    pub fn job_by_name(&self, name: &str) -> Option<&JobState> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

/// Run-wide bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    pub status: Status,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    /// Index of the module containing the running job. Only meaningful
    /// while a job is RUNNING.
    pub current_module_index: usize,
    /// `global_index` of the running job. Only meaningful while RUNNING.
    pub current_job_index: usize,
    pub total_modules: usize,
    pub total_jobs: usize,
}

/// The single persisted aggregate. Loaded and saved wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub version: String,
    pub global: GlobalState,
    pub modules: Vec<ModuleState>,
}

impl ExecutionStatus {
    pub fn module_by_name(&self, name: &str) -> Option<&ModuleState> {
        self.modules
            .iter()
            .find(|m| m.name == name || m.display_name == name)
    }

    pub fn module_by_name_mut(&mut self, name: &str) -> Option<&mut ModuleState> {
        self.modules
            .iter_mut()
            .find(|m| m.name == name || m.display_name == name)
    }

    /// Total jobs across all modules, counted rather than trusted.
    pub fn job_count(&self) -> usize {
        self.modules.iter().map(|m| m.jobs.len()).sum()
    }

    /// True when every job in every module is COMPLETED and at least one
    /// job exists.
    pub fn all_jobs_completed(&self) -> bool {
        self.job_count() > 0
            && self
                .modules
                .iter()
                .flat_map(|m| m.jobs.iter())
                .all(|j| j.status == Status::Completed)
    }

    /// Validate the invariants a freshly loaded tree must satisfy.
    ///
    /// Serde already rejects malformed status strings; this covers the
    /// structural invariants: version present, non-empty names, task
    /// counter bounds, and `global_index` forming a dense permutation of
    /// `0..total_jobs`.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.version.is_empty() {
            return Err(Error::Validation("status version is missing".to_string()));
        }

        let total = self.job_count();
        let mut seen = vec![false; total];

        for module in &self.modules {
            if module.name.is_empty() {
                return Err(Error::Validation(format!(
                    "module at index {} has an empty name",
                    module.index
                )));
            }
            for job in &module.jobs {
                if job.name.is_empty() {
                    return Err(Error::Validation(format!(
                        "job at index {} in module {} has an empty name",
                        job.index, module.name
                    )));
                }
                if job.tasks_completed > job.tasks_total {
                    return Err(Error::Validation(format!(
                        "job {} in module {}: tasks_completed {} exceeds tasks_total {}",
                        job.name, module.name, job.tasks_completed, job.tasks_total
                    )));
                }
                match seen.get_mut(job.global_index) {
                    Some(slot) if !*slot => *slot = true,
                    Some(_) => {
                        return Err(Error::Validation(format!(
                            "duplicate global_index {} at job {} in module {}",
                            job.global_index, job.name, module.name
                        )))
                    }
                    None => {
                        return Err(Error::Validation(format!(
                            "global_index {} out of range at job {} in module {}",
                            job.global_index, job.name, module.name
                        )))
                    }
                }
            }
        }

        if self.global.total_jobs != total {
            return Err(Error::Validation(format!(
                "global.total_jobs {} does not match counted jobs {}",
                self.global.total_jobs, total
            )));
        }
        if self.global.total_modules != self.modules.len() {
            return Err(Error::Validation(format!(
                "global.total_modules {} does not match counted modules {}",
                self.global.total_modules,
                self.modules.len()
            )));
        }

        Ok(())
    }
}
