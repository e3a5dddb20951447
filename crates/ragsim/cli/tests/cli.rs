use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn ragsim(state: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ragsim").unwrap();
    cmd.env_remove("RAGSIM_CONFIG").env_remove("RAGSIM_STATE").env_remove("RUST_LOG").arg("--state").arg(state);
    cmd
}

fn build_circular_wait(state: &Path) {
    for args in [
        vec!["add-process", "P0"],
        vec!["add-process", "P1"],
        vec!["add-resource", "R0"],
        vec!["add-resource", "R1"],
        vec!["allocate", "P0", "R0"],
        vec!["allocate", "P1", "R1"],
        vec!["request", "P0", "R1"],
        vec!["request", "P1", "R0"],
    ] {
        ragsim(state).args(&args).assert().success();
    }
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");

    ragsim(&state).arg("init").assert().success().stdout(predicate::str::contains("Initialized"));
    ragsim(&state).arg("init").assert().failure().stderr(predicate::str::contains("already exists"));
    ragsim(&state).args(["init", "--force"]).assert().success();
}

#[test]
fn test_detect_certain_deadlock() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    build_circular_wait(&state);

    ragsim(&state).arg("detect").assert().success().stdout(predicate::str::contains("\"hasDeadlock\": true"));
    ragsim(&state).arg("cycles").assert().success().stdout(predicate::str::contains("certain deadlock"));
}

#[test]
fn test_auto_named_process() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");

    ragsim(&state).arg("add-process").assert().success().stdout(predicate::str::contains("Added process P1"));
    ragsim(&state).arg("add-process").assert().success().stdout(predicate::str::contains("Added process P2"));
}

#[test]
fn test_failed_mutation_leaves_state_untouched() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    ragsim(&state).args(["add-process", "P0"]).assert().success();
    ragsim(&state).args(["add-resource", "R0", "--instances", "2"]).assert().success();
    let before = std::fs::read_to_string(&state).unwrap();

    ragsim(&state).args(["allocate", "P0", "R0", "-c", "3"]).assert().failure().stderr(predicate::str::contains("Not enough instances"));
    assert_eq!(std::fs::read_to_string(&state).unwrap(), before);
}

#[test]
fn test_resolve_saves_resolved_graph() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    build_circular_wait(&state);

    ragsim(&state).args(["resolve", "--strategy", "terminate"]).assert().success().stdout(predicate::str::contains("Victims: P0, P1"));
    ragsim(&state).arg("show").assert().success().stdout(predicate::str::contains("R0: 1/1 available"));
    ragsim(&state).arg("detect").assert().success().stdout(predicate::str::contains("\"hasDeadlock\": false"));
}

#[test]
fn test_export_import_round_trip() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    build_circular_wait(&state);

    let exported = ragsim(&state).arg("export").output().unwrap().stdout;
    let dump = dir.path().join("dump.json");
    std::fs::write(&dump, &exported).unwrap();

    let copy = dir.path().join("copy.json");
    ragsim(&copy).arg("import").arg(&dump).assert().success();
    ragsim(&copy).arg("export").assert().success().stdout(predicate::eq(exported));
}

#[test]
fn test_import_replaces_corrupt_state() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.json");
    build_circular_wait(&source);
    let exported = ragsim(&source).arg("export").output().unwrap().stdout;
    let dump = dir.path().join("dump.json");
    std::fs::write(&dump, &exported).unwrap();

    let state = dir.path().join("state.json");
    std::fs::write(&state, "{ not json").unwrap();
    ragsim(&state).arg("detect").assert().failure();

    ragsim(&state).arg("import").arg(&dump).assert().success().stdout(predicate::str::contains("Imported 2 process(es) and 2 resource(s)"));
    ragsim(&state).arg("export").assert().success().stdout(predicate::eq(exported));
}

#[test]
fn test_safety_and_admission_files() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    let bankers = dir.path().join("bankers.json");
    std::fs::write(
        &bankers,
        r#"{
            "available": [3, 3, 2],
            "allocation": [[0, 1, 0], [2, 0, 0], [3, 0, 2], [2, 1, 1], [0, 0, 2]],
            "max": [[7, 5, 3], [3, 2, 2], [9, 0, 2], [2, 2, 2], [4, 3, 3]]
        }"#,
    )
    .unwrap();

    ragsim(&state).arg("safety").arg(&bankers).assert().success().stdout(predicate::str::contains("\"isSafe\": true"));
    ragsim(&state)
        .arg("admit")
        .arg(&bankers)
        .args(["--process", "1", "--request", "2,0,0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exceeds maximum claim"));
}

#[test]
fn test_features_vector_length() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    build_circular_wait(&state);

    let output = ragsim(&state).arg("features").output().unwrap();
    assert!(output.status.success());
    let values: Vec<f64> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(values.len(), 23);
    assert_eq!(values[0], 2.0);

    ragsim(&state).args(["features", "--named"]).assert().success().stdout(predicate::str::contains("\"waiting_edge_count\": 2.0"));
}

#[test]
fn test_unknown_strategy_is_rejected() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    ragsim(&state).args(["resolve", "--strategy", "rollback"]).assert().failure();
}
