//! Plan document parsing.

pub mod plan;

pub use plan::{parse_plan, scan_plan_dir};
