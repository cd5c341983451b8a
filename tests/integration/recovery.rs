//! Crash safety, backups, and legacy file upgrades.

use std::fs;

use relay::Status;

use crate::fixtures::two_module_workspace;

#[test]
fn test_stale_temp_file_does_not_shadow_live_file() {
    let ws = two_module_workspace();
    let manager = ws.init();
    manager
        .transition_job_status("core", "Bootstrap", Status::Running)
        .unwrap();

    // Simulate a crash mid-save: a truncated temp file next to the live
    // file, never renamed into place.
    let temp_path = ws.status_file.with_extension("json.tmp");
    fs::write(&temp_path, "{\"version\": \"2.").unwrap();

    let fresh = ws.manager();
    fresh.load().unwrap();
    assert_eq!(
        fresh.get_job_status("core", "Bootstrap").unwrap(),
        Status::Running
    );

    // The next successful save replaces the stale temp file.
    fresh
        .transition_job_status("core", "Bootstrap", Status::Completed)
        .unwrap();
    assert!(!temp_path.exists());
}

#[test]
fn test_backup_then_restore_roundtrip() {
    let ws = two_module_workspace();
    let manager = ws.init();
    let backup = manager.backup().unwrap();

    // Mutate past the backup point.
    manager
        .transition_job_status("core", "Bootstrap", Status::Running)
        .unwrap();
    manager
        .transition_job_status("core", "Bootstrap", Status::Failed)
        .unwrap();

    manager.restore_from_backup(&backup).unwrap();
    assert_eq!(
        manager.get_job_status("core", "Bootstrap").unwrap(),
        Status::Pending
    );

    // The restore rewrote the live file too.
    let fresh = ws.manager();
    fresh.load().unwrap();
    assert_eq!(
        fresh.get_job_status("core", "Bootstrap").unwrap(),
        Status::Pending
    );
}

#[test]
fn test_restore_corrupt_backup_leaves_live_file_alone() {
    let ws = two_module_workspace();
    let manager = ws.init();
    let before = fs::read_to_string(&ws.status_file).unwrap();

    let bogus = ws.temp_dir.path().join("bogus.backup.json");
    fs::write(&bogus, "{\"modules\": \"nope\"}").unwrap();
    assert!(manager.restore_from_backup(&bogus).is_err());

    let after = fs::read_to_string(&ws.status_file).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_legacy_file_upgraded_end_to_end() {
    let ws = two_module_workspace();
    fs::create_dir_all(ws.status_file.parent().unwrap()).unwrap();
    fs::write(
        &ws.status_file,
        r#"{
            "version": "1.0",
            "global": { "status": "RUNNING" },
            "modules": {
                "core": {
                    "name": "core",
                    "status": "RUNNING",
                    "jobs": {
                        "job_1": {
                            "name": "Bootstrap",
                            "status": "COMPLETED",
                            "tasks": [
                                {
                                    "index": 1,
                                    "status": "COMPLETED",
                                    "description": "Create layout",
                                    "updated_at": "2024-06-01T00:00:00Z"
                                }
                            ]
                        },
                        "job_2": { "name": "Public API", "status": "RUNNING" }
                    }
                }
            }
        }"#,
    )
    .unwrap();

    let manager = ws.manager();
    manager.load().unwrap();

    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.version, relay::core::schema::SCHEMA_VERSION);
    assert_eq!(snapshot.global.status, Status::Running);
    assert_eq!(snapshot.modules.len(), 1);

    let module = &snapshot.modules[0];
    assert_eq!(module.name, "core");
    let bootstrap = module.job_by_name("Bootstrap").unwrap();
    assert_eq!(bootstrap.status, Status::Completed);
    assert_eq!(bootstrap.tasks_completed, 1);

    // Transitions keep working on the upgraded tree, and the file is
    // rewritten in the canonical array-based schema.
    manager
        .transition_job_status("core", "Public API", Status::Completed)
        .unwrap();
    let content = fs::read_to_string(&ws.status_file).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["version"], relay::core::schema::SCHEMA_VERSION);
    assert!(value["modules"].is_array());
}

#[test]
fn test_unrecognized_file_is_a_load_error() {
    let ws = two_module_workspace();
    fs::create_dir_all(ws.status_file.parent().unwrap()).unwrap();
    fs::write(&ws.status_file, r#"{"version": "3.0", "modules": []}"#).unwrap();

    let manager = ws.manager();
    assert!(manager.load().is_err());
    assert!(!manager.is_loaded());
}

#[test]
fn test_reinit_replaces_previous_run() {
    let ws = two_module_workspace();
    let manager = ws.init();
    manager
        .transition_job_status("core", "Bootstrap", Status::Running)
        .unwrap();

    // A second init from the same plans starts from a clean slate.
    let manager = ws.init();
    assert_eq!(
        manager.get_job_status("core", "Bootstrap").unwrap(),
        Status::Pending
    );
    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.global.status, Status::Pending);
}
