//! Test fixtures for integration tests.
//!
//! Provides a temporary workspace with a plan directory and a status file
//! path, plus canned plan documents.

use std::path::PathBuf;

use tempfile::TempDir;

use relay::StatusManager;

/// A temporary workspace holding plan documents and a status file.
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub plan_dir: PathBuf,
    pub status_file: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let plan_dir = temp_dir.path().join("plans");
        std::fs::create_dir_all(&plan_dir).expect("Failed to create plan dir");
        let status_file = temp_dir.path().join(".relay").join("status.json");
        Self {
            temp_dir,
            plan_dir,
            status_file,
        }
    }

    /// Write a plan document into the plan directory.
    pub fn write_plan(&self, file_name: &str, content: &str) {
        std::fs::write(self.plan_dir.join(file_name), content).expect("Failed to write plan");
    }

    /// A manager bound to this workspace's status file.
    pub fn manager(&self) -> StatusManager {
        StatusManager::new(&self.status_file)
    }

    /// Parse the plan directory and initialize the status file.
    pub fn init(&self) -> StatusManager {
        let plans = relay::parser::scan_plan_dir(&self.plan_dir).expect("Failed to scan plans");
        let manager = self.manager();
        manager.initialize(&plans).expect("Failed to initialize");
        manager
    }
}

/// Two-module workspace: `core` with two jobs, `storage` depending on
/// `core` with one job that also names a cross-module prerequisite.
pub fn two_module_workspace() -> TestWorkspace {
    let ws = TestWorkspace::new();
    ws.write_plan(
        "core.md",
        "\
# Plan: Core Engine

**Dependencies**: none

## job_1 - Bootstrap
**Prerequisites**: none
**Tasks**:
- [ ] 1. Create layout
- [ ] 2. Wire config

## job_2 - Public API
**Prerequisites**: job_1
**Tasks**:
- [ ] 1. Export types
",
    );
    ws.write_plan(
        "storage.md",
        "\
# Plan: Storage Layer

**Dependencies**: core

## job_1 - Persistence
**Prerequisites**: core/Public API
**Tasks**:
- [ ] 1. Save and load
",
    );
    ws
}
