//! Legacy status file detection and one-time upgrade.
//!
//! Early status files (version 1.x) keyed modules and jobs by name in JSON
//! objects, with no topological ordering and no index fields. Only the
//! array-based topological schema is canonical; a legacy file is converted
//! into the canonical shape immediately after load and never flows through
//! the engine in its original form.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::core::schema::{
    ExecutionStatus, GlobalState, JobState, ModuleState, Status, TaskState, SCHEMA_VERSION,
};
use crate::error::{Error, Result};
use crate::rlog;

/// On-disk format of a status file, decided by a lightweight pre-parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Current array-based topological schema (`version: "2.0"`).
    Canonical,
    /// Old object-keyed schema needing a one-time upgrade.
    Legacy,
}

/// Inspect the `version` field and the shape of `modules` to decide
/// whether the file needs an upgrade before use.
pub fn detect_format(content: &str) -> Result<FileFormat> {
    let value: serde_json::Value = serde_json::from_str(content)?;

    if value.get("version").and_then(|v| v.as_str()) == Some(SCHEMA_VERSION) {
        return Ok(FileFormat::Canonical);
    }

    match value.get("modules") {
        Some(serde_json::Value::Object(_)) => Ok(FileFormat::Legacy),
        _ => Err(Error::Validation(
            "unrecognized status file format".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct LegacyStatus {
    #[serde(default)]
    version: String,
    global: LegacyGlobal,
    modules: HashMap<String, LegacyModule>,
}

#[derive(Debug, Deserialize)]
struct LegacyGlobal {
    status: Status,
    start_time: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct LegacyModule {
    #[serde(default)]
    name: String,
    status: Status,
    #[serde(default)]
    jobs: HashMap<String, LegacyJob>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct LegacyJob {
    #[serde(default)]
    name: String,
    status: Status,
    #[serde(default)]
    loop_count: u32,
    #[serde(default)]
    retry_count: u32,
    #[serde(default)]
    tasks_total: usize,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    tasks: Vec<TaskState>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

/// Convert a legacy object-keyed file into the canonical schema.
///
/// Legacy maps carry no ordering, so modules and jobs are ordered by name
/// to keep the upgrade deterministic. Statuses, counters, and tasks are
/// preserved; `tasks_completed` is recomputed from the task list rather
/// than copied.
pub fn upgrade_legacy(content: &str) -> Result<ExecutionStatus> {
    let legacy: LegacyStatus = serde_json::from_str(content)?;
    let now = Utc::now();

    let mut module_names: Vec<&String> = legacy.modules.keys().collect();
    module_names.sort();

    let mut modules = Vec::with_capacity(module_names.len());
    let mut global_index = 0usize;

    for (module_index, module_name) in module_names.iter().enumerate() {
        let old = &legacy.modules[*module_name];
        let name = if old.name.is_empty() {
            (*module_name).clone()
        } else {
            old.name.clone()
        };

        let mut job_names: Vec<&String> = old.jobs.keys().collect();
        job_names.sort();

        let mut jobs = Vec::with_capacity(job_names.len());
        for (job_index, job_name) in job_names.iter().enumerate() {
            let old_job = &old.jobs[*job_name];
            let job_display = if old_job.name.is_empty() {
                (*job_name).clone()
            } else {
                old_job.name.clone()
            };

            let mut job = JobState {
                index: job_index,
                global_index,
                name: job_display,
                status: old_job.status,
                prerequisites: Vec::new(),
                tasks_total: old_job.tasks_total.max(old_job.tasks.len()),
                tasks_completed: 0,
                loop_count: old_job.loop_count,
                retry_count: old_job.retry_count,
                failure_reason: old_job.failure_reason.clone(),
                tasks: old_job.tasks.clone(),
                debug_log: Vec::new(),
                created_at: old_job.created_at.unwrap_or(now),
                updated_at: old_job.updated_at.unwrap_or(now),
            };
            job.recount_tasks();
            jobs.push(job);
            global_index += 1;
        }

        modules.push(ModuleState {
            index: module_index,
            display_name: name.clone(),
            source_file: format!("{}.md", name),
            name,
            status: old.status,
            dependencies: Vec::new(),
            jobs,
            created_at: old.created_at.unwrap_or(now),
            updated_at: old.updated_at.unwrap_or(now),
        });
    }

    rlog!(
        "Upgraded legacy status file (version {:?}): {} modules, {} jobs",
        legacy.version,
        modules.len(),
        global_index
    );

    Ok(ExecutionStatus {
        version: SCHEMA_VERSION.to_string(),
        global: GlobalState {
            status: legacy.global.status,
            start_time: legacy.global.start_time.unwrap_or(now),
            last_update: legacy.global.last_update.unwrap_or(now),
            current_module_index: 0,
            current_job_index: 0,
            total_modules: modules.len(),
            total_jobs: global_index,
        },
        modules,
    })
}
