//! StatusManager - single owner of the persisted execution status tree.
//!
//! One manager instance is bound to one status file path and exclusively
//! owns its in-memory tree behind an `RwLock`. All mutations go through
//! named operations that validate first, mutate second, and persist third;
//! a rejected mutation performs no I/O. Saves go through a temporary file
//! plus atomic rename so a crash mid-write can never corrupt the live file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;

use crate::core::scheduler::{build_execution_status, PlanInfo};
use crate::core::schema::{DebugLogEntry, ExecutionStatus, Status};
use crate::core::transition::{check_transition, is_retry};
use crate::error::{Error, Result};
use crate::state::migration::{self, FileFormat};
use crate::{rlog, rlog_debug};

/// Timestamp format for backup file names.
const BACKUP_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";
/// Upper bound on backup name collision retries.
const MAX_BACKUP_COLLISIONS: u32 = 1000;

/// Owns the in-memory `ExecutionStatus` for one status file and is the
/// sole writer of that file.
pub struct StatusManager {
    file_path: PathBuf,
    state: RwLock<Option<ExecutionStatus>>,
}

impl StatusManager {
    /// Create a manager bound to the given status file path. No I/O is
    /// performed until `load` or `initialize`.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            state: RwLock::new(None),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Whether a status tree is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.state.read().expect("state lock poisoned").is_some()
    }

    /// Clone of the current tree, for queries and JSON export.
    pub fn snapshot(&self) -> Result<ExecutionStatus> {
        self.state
            .read()
            .expect("state lock poisoned")
            .clone()
            .ok_or_else(|| not_initialized())
    }

    /// Bootstrap the tree from parsed plan documents and persist it.
    ///
    /// # Errors
    /// Fails if `plans` is empty or a dependency cycle is detected.
    pub fn initialize(&self, plans: &[PlanInfo]) -> Result<()> {
        rlog!("StatusManager::initialize plans={}", plans.len());
        let status = build_execution_status(plans)?;
        {
            let mut guard = self.state.write().expect("state lock poisoned");
            *guard = Some(status);
        }
        self.save()
    }

    /// Load the status file.
    ///
    /// A missing file is not an error: the manager is left uninitialized
    /// and callers should instruct the operator to run initialization.
    /// A present but corrupt or unrecognized file is a fatal load error.
    /// Legacy object-keyed files are upgraded into the canonical schema
    /// immediately, before anything else sees them.
    pub fn load(&self) -> Result<()> {
        rlog_debug!("StatusManager::load path={}", self.file_path.display());

        if !self.file_path.exists() {
            rlog_debug!("Status file not found, leaving state uninitialized");
            let mut guard = self.state.write().expect("state lock poisoned");
            *guard = None;
            return Ok(());
        }

        let content = fs::read_to_string(&self.file_path)?;
        let status = match migration::detect_format(&content)? {
            FileFormat::Canonical => serde_json::from_str::<ExecutionStatus>(&content)?,
            FileFormat::Legacy => migration::upgrade_legacy(&content)?,
        };
        status.validate()?;

        rlog_debug!(
            "Status loaded: {} modules, {} jobs",
            status.modules.len(),
            status.global.total_jobs
        );
        let mut guard = self.state.write().expect("state lock poisoned");
        *guard = Some(status);
        Ok(())
    }

    /// Persist the whole tree atomically.
    ///
    /// Serializes under the read lock, writes to a sibling temp file, then
    /// renames over the live file. The parent directory is created if
    /// missing. Correctness relies on the rename, not on lock scope.
    pub fn save(&self) -> Result<()> {
        let contents = {
            let guard = self.state.read().expect("state lock poisoned");
            let status = guard.as_ref().ok_or_else(not_initialized)?;
            serde_json::to_string_pretty(status)?
        };

        if let Some(dir) = self.file_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let temp_path = self.file_path.with_extension("json.tmp");
        fs::write(&temp_path, &contents)?;
        if let Err(err) = fs::rename(&temp_path, &self.file_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }
        rlog_debug!("Status saved: {}", self.file_path.display());
        Ok(())
    }

    /// Copy the live status file to a timestamped sibling.
    ///
    /// Collisions get a numeric suffix. Returns the backup path.
    pub fn backup(&self) -> Result<PathBuf> {
        if !self.file_path.exists() {
            return Err(Error::NotFound(format!(
                "status file {} does not exist, cannot backup",
                self.file_path.display()
            )));
        }

        let stem = self
            .file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("status");
        let dir = self.file_path.parent().unwrap_or_else(|| Path::new("."));
        let timestamp = Utc::now().format(BACKUP_TIME_FORMAT);

        let mut backup_path = dir.join(format!("{}_{}.backup.json", stem, timestamp));
        let mut counter = 1;
        while backup_path.exists() {
            if counter > MAX_BACKUP_COLLISIONS {
                return Err(Error::Validation(
                    "too many backup file collisions".to_string(),
                ));
            }
            backup_path = dir.join(format!("{}_{}_{}.backup.json", stem, timestamp, counter));
            counter += 1;
        }

        fs::copy(&self.file_path, &backup_path)?;
        rlog!("Backup created: {}", backup_path.display());
        Ok(backup_path)
    }

    /// Restore state from a backup file: parse, validate, adopt, save.
    pub fn restore_from_backup(&self, backup_path: &Path) -> Result<()> {
        rlog!("Restoring from backup: {}", backup_path.display());
        let content = fs::read_to_string(backup_path)?;
        let status = match migration::detect_format(&content)? {
            FileFormat::Canonical => serde_json::from_str::<ExecutionStatus>(&content)?,
            FileFormat::Legacy => migration::upgrade_legacy(&content)?,
        };
        status.validate()?;

        {
            let mut guard = self.state.write().expect("state lock poisoned");
            *guard = Some(status);
        }
        self.save()
    }

    /// Remove the status file and drop the in-memory tree. A reset always
    /// replaces the whole file, never patches it.
    pub fn reset(&self) -> Result<()> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path)?;
        }
        let mut guard = self.state.write().expect("state lock poisoned");
        *guard = None;
        rlog!("Status reset: {}", self.file_path.display());
        Ok(())
    }

    /// Pure transition check: reports the same error `transition_job_status`
    /// would, without mutating anything.
    pub fn can_transition(&self, module: &str, job: &str, to: Status) -> Result<()> {
        let guard = self.state.read().expect("state lock poisoned");
        let status = guard.as_ref().ok_or_else(not_initialized)?;
        let module_state = status
            .module_by_name(module)
            .ok_or_else(|| Error::NotFound(format!("module {}", module)))?;
        let job_state = module_state
            .job_by_name(job)
            .ok_or_else(|| Error::NotFound(format!("job {} in module {}", job, module)))?;
        check_transition(job_state.status, to)
    }

    /// Apply a validated status transition to a job and persist.
    ///
    /// On success: updates the job's status and timestamp, bumps
    /// `retry_count` for FAILED -> PENDING, rederives the module status,
    /// updates global bookkeeping (current indices while RUNNING, COMPLETED
    /// promotion when every job is done, immediate FAILED propagation), and
    /// saves atomically. A rejected transition leaves the tree untouched
    /// and performs no I/O.
    pub fn transition_job_status(&self, module: &str, job: &str, to: Status) -> Result<()> {
        {
            let mut guard = self.state.write().expect("state lock poisoned");
            let status = guard.as_mut().ok_or_else(not_initialized)?;

            let (module_idx, job_idx) = locate(status, module, job)?;
            let from = status.modules[module_idx].jobs[job_idx].status;
            check_transition(from, to)?;

            let now = Utc::now();
            let module_state = &mut status.modules[module_idx];
            let job_state = &mut module_state.jobs[job_idx];

            job_state.status = to;
            job_state.updated_at = now;
            if is_retry(from, to) {
                job_state.retry_count += 1;
            }
            let module_index = module_state.index;
            let job_global_index = job_state.global_index;

            module_state.status = module_state.derived_status();
            module_state.updated_at = now;

            status.global.last_update = now;
            match to {
                Status::Running => {
                    status.global.status = Status::Running;
                    status.global.current_module_index = module_index;
                    status.global.current_job_index = job_global_index;
                }
                Status::Completed => {
                    if status.all_jobs_completed() {
                        status.global.status = Status::Completed;
                    }
                }
                Status::Failed => {
                    status.global.status = Status::Failed;
                }
                _ => {}
            }

            rlog!(
                "Transition {}/{}: {} -> {}",
                module,
                job,
                from,
                to
            );
        }
        self.save()
    }

    /// Update one task's status and rederive the owning job's counters.
    ///
    /// `task_index` is the 1-based authored index. `tasks_completed` is
    /// recomputed from the task list on every call, never incremented.
    pub fn update_task_status(
        &self,
        module: &str,
        job: &str,
        task_index: usize,
        to: Status,
    ) -> Result<()> {
        {
            let mut guard = self.state.write().expect("state lock poisoned");
            let status = guard.as_mut().ok_or_else(not_initialized)?;
            let (module_idx, job_idx) = locate(status, module, job)?;

            let now = Utc::now();
            let module_state = &mut status.modules[module_idx];
            let job_state = &mut module_state.jobs[job_idx];
            let task = job_state
                .tasks
                .iter_mut()
                .find(|t| t.index == task_index)
                .ok_or_else(|| {
                    Error::NotFound(format!("task {} in job {}/{}", task_index, module, job))
                })?;

            task.status = to;
            task.updated_at = now;
            job_state.recount_tasks();
            job_state.updated_at = now;
            module_state.updated_at = now;
            status.global.last_update = now;
        }
        self.save()
    }

    /// Record or clear a job's failure reason.
    pub fn set_failure_reason(
        &self,
        module: &str,
        job: &str,
        reason: Option<String>,
    ) -> Result<()> {
        {
            let mut guard = self.state.write().expect("state lock poisoned");
            let status = guard.as_mut().ok_or_else(not_initialized)?;
            let (module_idx, job_idx) = locate(status, module, job)?;

            let now = Utc::now();
            let job_state = &mut status.modules[module_idx].jobs[job_idx];
            job_state.failure_reason = reason;
            job_state.updated_at = now;
            status.global.last_update = now;
        }
        self.save()
    }

    /// Append a diagnostic record to a job's debug log.
    pub fn append_debug_log(&self, module: &str, job: &str, message: &str) -> Result<()> {
        {
            let mut guard = self.state.write().expect("state lock poisoned");
            let status = guard.as_mut().ok_or_else(not_initialized)?;
            let (module_idx, job_idx) = locate(status, module, job)?;

            let now = Utc::now();
            let job_state = &mut status.modules[module_idx].jobs[job_idx];
            job_state.debug_log.push(DebugLogEntry {
                message: message.to_string(),
                timestamp: now,
            });
            job_state.updated_at = now;
            status.global.last_update = now;
        }
        self.save()
    }

    /// Current status of a specific job.
    pub fn get_job_status(&self, module: &str, job: &str) -> Result<Status> {
        let guard = self.state.read().expect("state lock poisoned");
        let status = guard.as_ref().ok_or_else(not_initialized)?;
        let (module_idx, job_idx) = locate(status, module, job)?;
        Ok(status.modules[module_idx].jobs[job_idx].status)
    }

    /// Run a read-only closure against the current tree. Used by the
    /// query layer; readers may run concurrently.
    pub(crate) fn with_status<T>(&self, f: impl FnOnce(&ExecutionStatus) -> T) -> Result<T> {
        let guard = self.state.read().expect("state lock poisoned");
        let status = guard.as_ref().ok_or_else(not_initialized)?;
        Ok(f(status))
    }
}

fn not_initialized() -> Error {
    Error::NotInitialized("status not loaded; run init first".to_string())
}

/// Resolve module and job names to positions in the tree.
fn locate(status: &ExecutionStatus, module: &str, job: &str) -> Result<(usize, usize)> {
    let module_idx = status
        .modules
        .iter()
        .position(|m| m.name == module || m.display_name == module)
        .ok_or_else(|| Error::NotFound(format!("module {}", module)))?;
    let job_idx = status.modules[module_idx]
        .jobs
        .iter()
        .position(|j| j.name == job)
        .ok_or_else(|| Error::NotFound(format!("job {} in module {}", job, module)))?;
    Ok((module_idx, job_idx))
}
