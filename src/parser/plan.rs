//! Markdown plan document parser.
//!
//! Plans are human-authored markdown, one module per file:
//!
//! ```markdown
//! # Plan: Storage Layer
//!
//! **Dependencies**: core, config
//!
//! ## job_1 - Create schema
//! **Prerequisites**: none
//! **Tasks**:
//! - [ ] 1. Define tables
//! - [x] 2. Write migration
//!
//! ## job_2 - Wire up queries
//! **Prerequisites**: job_1, core/Parse config
//! ```
//!
//! The module `name` is the filename stem; the H1 title supplies the
//! display name. Dependency and prerequisite lists are comma separated,
//! with `none` meaning empty. The parser produces read-only [`PlanInfo`]
//! input for the scheduler and knows nothing about execution state.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::scheduler::{JobInfo, PlanInfo, TaskInfo};
use crate::error::{Error, Result};
use crate::rlog_debug;

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\s+(?:[Pp]lan:\s*)?(.+?)\s*$").unwrap())
}

fn job_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^##\s+job_(\d+)(?:\s*-\s*(.+?))?\s*$").unwrap())
}

fn dependencies_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\*\*Dependencies\*\*:\s*(.*)$").unwrap())
}

fn prerequisites_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\*\*Prerequisites\*\*:\s*(.*)$").unwrap())
}

fn task_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-*]\s+\[( |x|X)\]\s+(?:(\d+)\.\s*)?(.+?)\s*$").unwrap())
}

/// Split a comma-separated list field, dropping empties and `none`.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}

/// Parse one plan document. `file_name` is the plan's filename, used for
/// the module identifier and error reporting.
pub fn parse_plan(content: &str, file_name: &str) -> Result<PlanInfo> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string();

    let mut display_name = stem.clone();
    let mut saw_title = false;
    let mut dependencies = Vec::new();
    let mut saw_dependencies = false;
    let mut jobs: Vec<JobInfo> = Vec::new();

    for line in content.lines() {
        let line = line.trim_end();

        if let Some(caps) = job_header_re().captures(line) {
            let index: usize = caps[1].parse().map_err(|_| Error::PlanParse {
                file: file_name.to_string(),
                message: format!("invalid job index in header: {}", line),
            })?;
            if jobs.iter().any(|j| j.index == index) {
                return Err(Error::PlanParse {
                    file: file_name.to_string(),
                    message: format!("duplicate job index {}", index),
                });
            }
            let name = caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| format!("job_{}", index));
            jobs.push(JobInfo {
                index,
                name,
                prerequisites: Vec::new(),
                tasks: Vec::new(),
            });
            continue;
        }

        match jobs.last_mut() {
            None => {
                // Module preamble.
                if let Some(caps) = title_re().captures(line) {
                    if !saw_title {
                        display_name = caps[1].to_string();
                        saw_title = true;
                    }
                } else if let Some(caps) = dependencies_re().captures(line) {
                    if !saw_dependencies {
                        dependencies = split_list(&caps[1]);
                        saw_dependencies = true;
                    }
                }
            }
            Some(job) => {
                if let Some(caps) = prerequisites_re().captures(line) {
                    job.prerequisites = split_list(&caps[1]);
                } else if let Some(caps) = task_item_re().captures(line) {
                    let completed = !caps[1].trim().is_empty();
                    let index = caps
                        .get(2)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(job.tasks.len() + 1);
                    job.tasks.push(TaskInfo {
                        index,
                        description: caps[3].to_string(),
                        completed,
                    });
                }
            }
        }
    }

    rlog_debug!(
        "Parsed plan {}: {} dependencies, {} jobs",
        file_name,
        dependencies.len(),
        jobs.len()
    );

    Ok(PlanInfo {
        name: stem,
        display_name,
        source_file: file_name.to_string(),
        dependencies,
        jobs,
    })
}

/// Scan a directory for plan documents and parse each one.
///
/// Reads every `*.md` file except `README*`, in filename order for
/// deterministic input to the scheduler.
pub fn scan_plan_dir(dir: &Path) -> Result<Vec<PlanInfo>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!(
            "plan directory {}",
            dir.display()
        )));
    }

    let mut file_names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".md") && !name.starts_with("README"))
        .collect();
    file_names.sort();

    let mut plans = Vec::with_capacity(file_names.len());
    for file_name in file_names {
        let content = std::fs::read_to_string(dir.join(&file_name))?;
        plans.push(parse_plan(&content, &file_name)?);
    }
    Ok(plans)
}
