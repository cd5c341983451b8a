//! Dependency scheduler for plan-driven execution.
//!
//! Converts parsed plan documents into the final ordered [`ExecutionStatus`]
//! tree. Modules are topologically sorted by their declared dependencies,
//! then jobs are sorted within each module by their intra-module
//! prerequisites. Both levels run Kahn's algorithm over a petgraph
//! [`DiGraph`] with a deterministic tie-break, so identical input always
//! produces the identical schedule.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::Utc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;

use crate::core::schema::{
    ExecutionStatus, GlobalState, JobState, ModuleState, Status, TaskState, SCHEMA_VERSION,
};
use crate::error::{Error, Result};
use crate::rlog_debug;

/// Reserved dependency token meaning "depends on every other module".
pub const WILDCARD_DEPENDENCY: &str = "__ALL__";

/// Parsed plan document for one module. Produced by the plan parser and
/// treated as read-only input here.
#[derive(Debug, Clone)]
pub struct PlanInfo {
    /// Stable module identifier (plan filename stem).
    pub name: String,
    /// Human-readable module name from the plan title.
    pub display_name: String,
    /// Plan filename this module came from.
    pub source_file: String,
    /// Declared module-name dependencies.
    pub dependencies: Vec<String>,
    pub jobs: Vec<JobInfo>,
}

/// Parsed job definition.
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Authored job number (the N in `job_N`).
    pub index: usize,
    pub name: String,
    /// Raw prerequisite strings as authored.
    pub prerequisites: Vec<String>,
    pub tasks: Vec<TaskInfo>,
}

/// Parsed task checklist item.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub index: usize,
    pub description: String,
    /// Whether the plan author already checked this item off.
    pub completed: bool,
}

/// Resolve an intra-module prerequisite reference of the form `job_N`
/// (optionally followed by ` - description`). Cross-module references and
/// anything else return `None` and take no part in job-level scheduling;
/// cross-module ordering is already guaranteed by the module-level sort.
pub fn intra_module_prerequisite(raw: &str) -> Option<usize> {
    static JOB_REF: OnceLock<Regex> = OnceLock::new();
    let re = JOB_REF.get_or_init(|| Regex::new(r"^job_(\d+)(?:\s*-\s*.*)?$").unwrap());
    re.captures(raw.trim())
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse a cross-module prerequisite of the form `module/job_name`.
/// Returns the (module, job) pair for enforcement at selection time.
pub fn cross_module_prerequisite(raw: &str) -> Option<(&str, &str)> {
    let trimmed = raw.trim();
    let (module, job) = trimmed.split_once('/')?;
    if module.is_empty() || job.is_empty() {
        return None;
    }
    Some((module.trim(), job.trim()))
}

/// Build the complete ordered execution tree from parsed plans.
///
/// # Errors
/// Returns `Error::Validation` if `plans` is empty or contains duplicate
/// module names or job indices, and `Error::Cycle` if either dependency
/// graph cannot be fully ordered.
pub fn build_execution_status(plans: &[PlanInfo]) -> Result<ExecutionStatus> {
    if plans.is_empty() {
        return Err(Error::Validation(
            "no plan documents to schedule".to_string(),
        ));
    }

    let ordered_modules = sort_modules(plans)?;

    let now = Utc::now();
    let mut modules = Vec::with_capacity(ordered_modules.len());
    let mut global_index = 0usize;

    for (module_index, plan) in ordered_modules.iter().enumerate() {
        let ordered_jobs = sort_jobs(plan)?;

        let mut jobs = Vec::with_capacity(ordered_jobs.len());
        for (job_index, info) in ordered_jobs.iter().enumerate() {
            let tasks: Vec<TaskState> = info
                .tasks
                .iter()
                .map(|t| TaskState {
                    index: t.index,
                    status: if t.completed {
                        Status::Completed
                    } else {
                        Status::Pending
                    },
                    description: t.description.clone(),
                    updated_at: now,
                })
                .collect();

            let mut job = JobState {
                index: job_index,
                global_index,
                name: info.name.clone(),
                status: Status::Pending,
                prerequisites: info.prerequisites.clone(),
                tasks_total: tasks.len(),
                tasks_completed: 0,
                loop_count: 0,
                retry_count: 0,
                failure_reason: None,
                tasks,
                debug_log: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            job.recount_tasks();
            jobs.push(job);
            global_index += 1;
        }

        modules.push(ModuleState {
            index: module_index,
            name: plan.name.clone(),
            display_name: plan.display_name.clone(),
            source_file: plan.source_file.clone(),
            status: Status::Pending,
            dependencies: plan.dependencies.clone(),
            jobs,
            created_at: now,
            updated_at: now,
        });
    }

    rlog_debug!(
        "Scheduled {} modules, {} jobs",
        modules.len(),
        global_index
    );

    Ok(ExecutionStatus {
        version: SCHEMA_VERSION.to_string(),
        global: GlobalState {
            status: Status::Pending,
            start_time: now,
            last_update: now,
            current_module_index: 0,
            current_job_index: 0,
            total_modules: modules.len(),
            total_jobs: global_index,
        },
        modules,
    })
}

/// Topologically sort modules by declared dependencies.
///
/// An in-degree counts every declared dependency, including names that do
/// not resolve to a known module; an unresolvable dependency therefore
/// leaves its module stuck and surfaces as a cycle error. Ties break on
/// lexicographically smallest module name.
fn sort_modules(plans: &[PlanInfo]) -> Result<Vec<&PlanInfo>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for plan in plans {
        if nodes.contains_key(plan.name.as_str()) {
            return Err(Error::Validation(format!(
                "duplicate module name {}",
                plan.name
            )));
        }
        let node = graph.add_node(plan.name.as_str());
        nodes.insert(plan.name.as_str(), node);
    }

    // Expand the wildcard into explicit edges to every other module before
    // in-degree computation.
    let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
    for plan in plans {
        let dependent = nodes[plan.name.as_str()];
        let deps: Vec<&str> = if plan.dependencies.iter().any(|d| d == WILDCARD_DEPENDENCY) {
            plans
                .iter()
                .map(|p| p.name.as_str())
                .filter(|n| *n != plan.name)
                .collect()
        } else {
            plan.dependencies.iter().map(|d| d.as_str()).collect()
        };

        in_degree.insert(dependent, deps.len());
        for dep in deps {
            if let Some(&dep_node) = nodes.get(dep) {
                graph.add_edge(dep_node, dependent, ());
            }
        }
    }

    let mut ready: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|n| in_degree[n] == 0)
        .collect();
    ready.sort_by_key(|n| graph[*n]);

    let mut order = Vec::with_capacity(plans.len());
    while !ready.is_empty() {
        let current = ready.remove(0);
        order.push(current);

        for dependent in graph.neighbors_directed(current, Direction::Outgoing) {
            let degree = in_degree.get_mut(&dependent).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.push(dependent);
                ready.sort_by_key(|n| graph[*n]);
            }
        }
    }

    if order.len() != plans.len() {
        let mut remaining: Vec<String> = in_degree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(n, _)| graph[*n].to_string())
            .collect();
        remaining.sort();
        return Err(Error::Cycle {
            scope: "modules".to_string(),
            remaining,
        });
    }

    let by_name: HashMap<&str, &PlanInfo> = plans.iter().map(|p| (p.name.as_str(), p)).collect();
    Ok(order.into_iter().map(|n| by_name[graph[n]]).collect())
}

/// Topologically sort jobs within one module by intra-module prerequisites.
///
/// Only `job_N` references to jobs in the same module form edges; ties
/// break on the smallest authored index. Same stuck-node semantics as
/// module sorting: a prerequisite naming a nonexistent job index never
/// resolves and is reported as a cycle.
fn sort_jobs(plan: &PlanInfo) -> Result<Vec<&JobInfo>> {
    if plan.jobs.is_empty() {
        return Ok(Vec::new());
    }

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut nodes: HashMap<usize, NodeIndex> = HashMap::new();

    for job in &plan.jobs {
        if nodes.contains_key(&job.index) {
            return Err(Error::Validation(format!(
                "duplicate job index {} in module {}",
                job.index, plan.name
            )));
        }
        let node = graph.add_node(job.index);
        nodes.insert(job.index, node);
    }

    let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
    for job in &plan.jobs {
        let dependent = nodes[&job.index];
        let prereqs: Vec<usize> = job
            .prerequisites
            .iter()
            .filter_map(|p| intra_module_prerequisite(p))
            .collect();

        in_degree.insert(dependent, prereqs.len());
        for prereq in prereqs {
            if let Some(&prereq_node) = nodes.get(&prereq) {
                graph.add_edge(prereq_node, dependent, ());
            }
        }
    }

    let mut ready: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|n| in_degree[n] == 0)
        .collect();
    ready.sort_by_key(|n| graph[*n]);

    let mut order = Vec::with_capacity(plan.jobs.len());
    while !ready.is_empty() {
        let current = ready.remove(0);
        order.push(current);

        for dependent in graph.neighbors_directed(current, Direction::Outgoing) {
            let degree = in_degree.get_mut(&dependent).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.push(dependent);
                ready.sort_by_key(|n| graph[*n]);
            }
        }
    }

    if order.len() != plan.jobs.len() {
        let mut remaining: Vec<String> = in_degree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(n, _)| format!("job_{}", graph[*n]))
            .collect();
        remaining.sort();
        return Err(Error::Cycle {
            scope: format!("jobs of module {}", plan.name),
            remaining,
        });
    }

    let by_index: HashMap<usize, &JobInfo> = plan.jobs.iter().map(|j| (j.index, j)).collect();
    Ok(order.into_iter().map(|n| by_index[&graph[n]]).collect())
}
