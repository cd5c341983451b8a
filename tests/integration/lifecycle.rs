//! End-to-end lifecycle: plan documents on disk through init, transitions,
//! queries, and completion.

use relay::core::schema::SCHEMA_VERSION;
use relay::{Error, Status};

use crate::fixtures::two_module_workspace;

#[test]
fn test_init_from_plan_directory() {
    let ws = two_module_workspace();
    let manager = ws.init();

    assert!(ws.status_file.exists());
    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.version, SCHEMA_VERSION);
    assert_eq!(snapshot.global.total_modules, 2);
    assert_eq!(snapshot.global.total_jobs, 3);
    assert_eq!(snapshot.global.status, Status::Pending);

    // `storage` depends on `core`, so `core` is scheduled first.
    assert_eq!(snapshot.modules[0].name, "core");
    assert_eq!(snapshot.modules[0].display_name, "Core Engine");
    assert_eq!(snapshot.modules[1].name, "storage");

    // Parsed job names and task counts survive the build.
    let bootstrap = &snapshot.modules[0].jobs[0];
    assert_eq!(bootstrap.name, "Bootstrap");
    assert_eq!(bootstrap.tasks_total, 2);
    assert_eq!(bootstrap.tasks_completed, 0);
    assert_eq!(bootstrap.status, Status::Pending);
}

#[test]
fn test_fresh_manager_loads_what_init_wrote() {
    let ws = two_module_workspace();
    let initialized = ws.init();
    let expected = initialized.snapshot().unwrap();

    let manager = ws.manager();
    manager.load().unwrap();
    let loaded = manager.snapshot().unwrap();

    assert_eq!(
        serde_json::to_value(&expected).unwrap(),
        serde_json::to_value(&loaded).unwrap()
    );
}

#[test]
fn test_full_run_to_completion() {
    let ws = two_module_workspace();
    let manager = ws.init();

    // Drive every job through RUNNING -> COMPLETED in schedule order.
    loop {
        let Some(next) = manager.next_pending_job().unwrap() else {
            break;
        };
        manager
            .transition_job_status(&next.module, &next.job, Status::Running)
            .unwrap();

        let current = manager.current_job().unwrap().unwrap();
        assert_eq!(current.module, next.module);
        assert_eq!(current.job, next.job);

        manager
            .transition_job_status(&next.module, &next.job, Status::Completed)
            .unwrap();
    }

    let summary = manager.summary().unwrap();
    assert_eq!(summary.status, Status::Completed);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.pending, 0);
    assert!(manager.current_job().unwrap().is_none());
}

#[test]
fn test_cross_module_prerequisite_gates_selection() {
    let ws = two_module_workspace();
    let manager = ws.init();

    // Finish core/Bootstrap only. storage/Persistence requires
    // core/Public API, so it must not be offered yet.
    manager
        .transition_job_status("core", "Bootstrap", Status::Running)
        .unwrap();
    manager
        .transition_job_status("core", "Bootstrap", Status::Completed)
        .unwrap();
    manager
        .transition_job_status("core", "Public API", Status::Running)
        .unwrap();
    manager
        .transition_job_status("core", "Public API", Status::Blocked)
        .unwrap();

    assert!(manager.next_pending_job().unwrap().is_none());

    manager
        .transition_job_status("core", "Public API", Status::Pending)
        .unwrap();
    manager
        .transition_job_status("core", "Public API", Status::Running)
        .unwrap();
    manager
        .transition_job_status("core", "Public API", Status::Completed)
        .unwrap();

    let next = manager.next_pending_job().unwrap().unwrap();
    assert_eq!(next.module, "storage");
    assert_eq!(next.job, "Persistence");
}

#[test]
fn test_failure_and_retry_cycle() {
    let ws = two_module_workspace();
    let manager = ws.init();

    manager
        .transition_job_status("core", "Bootstrap", Status::Running)
        .unwrap();
    manager
        .transition_job_status("core", "Bootstrap", Status::Failed)
        .unwrap();
    manager
        .set_failure_reason("core", "Bootstrap", Some("compile error".to_string()))
        .unwrap();
    manager
        .append_debug_log("core", "Bootstrap", "stderr captured")
        .unwrap();

    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.global.status, Status::Failed);
    assert_eq!(snapshot.modules[0].status, Status::Failed);
    let job = &snapshot.modules[0].jobs[0];
    assert_eq!(job.failure_reason.as_deref(), Some("compile error"));
    assert_eq!(job.debug_log.len(), 1);

    // Retry resets the job to PENDING and counts the attempt.
    manager
        .transition_job_status("core", "Bootstrap", Status::Pending)
        .unwrap();
    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.modules[0].jobs[0].retry_count, 1);
    assert_eq!(snapshot.modules[0].status, Status::Pending);

    let next = manager.next_pending_job().unwrap().unwrap();
    assert_eq!(next.job, "Bootstrap");
}

#[test]
fn test_completed_job_is_terminal() {
    let ws = two_module_workspace();
    let manager = ws.init();

    manager
        .transition_job_status("core", "Bootstrap", Status::Running)
        .unwrap();
    manager
        .transition_job_status("core", "Bootstrap", Status::Completed)
        .unwrap();

    for to in [Status::Pending, Status::Running, Status::Failed, Status::Blocked] {
        assert!(matches!(
            manager.transition_job_status("core", "Bootstrap", to),
            Err(Error::Transition { .. })
        ));
    }
    assert_eq!(
        manager.get_job_status("core", "Bootstrap").unwrap(),
        Status::Completed
    );
}

#[test]
fn test_task_updates_roll_up_into_job() {
    let ws = two_module_workspace();
    let manager = ws.init();

    manager
        .update_task_status("core", "Bootstrap", 1, Status::Completed)
        .unwrap();
    manager
        .update_task_status("core", "Bootstrap", 2, Status::Completed)
        .unwrap();

    let snapshot = manager.snapshot().unwrap();
    let job = &snapshot.modules[0].jobs[0];
    assert_eq!(job.tasks_completed, 2);
    // Task progress never flips the job status by itself.
    assert_eq!(job.status, Status::Pending);

    // Changes are persisted: a fresh manager sees the same counts.
    let fresh = ws.manager();
    fresh.load().unwrap();
    let snapshot = fresh.snapshot().unwrap();
    assert_eq!(snapshot.modules[0].jobs[0].tasks_completed, 2);
}

#[test]
fn test_module_display_name_resolves_too() {
    let ws = two_module_workspace();
    let manager = ws.init();

    manager
        .transition_job_status("Core Engine", "Bootstrap", Status::Running)
        .unwrap();
    assert_eq!(
        manager.get_job_status("core", "Bootstrap").unwrap(),
        Status::Running
    );
}
