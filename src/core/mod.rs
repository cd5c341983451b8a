//! Core engine: status schema, dependency scheduler, transition rules.

pub mod schema;
pub mod scheduler;
pub mod transition;

pub use schema::{
    DebugLogEntry, ExecutionStatus, GlobalState, JobState, ModuleState, Status, TaskState,
    SCHEMA_VERSION,
};
pub use scheduler::{
    build_execution_status, JobInfo, PlanInfo, TaskInfo, WILDCARD_DEPENDENCY,
};
