use std::process::Command;

use similar_asserts::assert_eq;
use test_log::test;

fn simulator(args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_simulator"))
        .args(args)
        .env_remove("SIM_WORKLOAD")
        .env_remove("SIM_SEED")
        .env_remove("SIM_METRICS_FILE")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "simulator failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn generate_is_reproducible_and_runnable() {
    let first = simulator(&["generate", "--count", "3", "--seed", "7"]);
    let second = simulator(&["generate", "--count", "3", "--seed", "7"]);
    assert_eq!(first, second);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workload.yaml");
    std::fs::write(&path, &first).unwrap();

    let json = simulator(&[
        "run",
        "--workload",
        path.to_str().unwrap(),
        "--format",
        "json",
        "--max-ticks",
        "500",
    ]);
    let report: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(report["metrics"]["completed"], serde_json::json!(3));
    assert_eq!(report["processes"].as_array().unwrap().len(), 3);
}

#[test]
fn text_report_and_metrics_file() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = dir.path().join("metrics.log");

    let text = simulator(&[
        "run",
        "--random",
        "4",
        "--seed",
        "11",
        "--policy",
        "priority",
        "--replacement",
        "lru",
        "--frames",
        "3",
        "--max-ticks",
        "500",
        "--metrics-file",
        metrics.to_str().unwrap(),
        "--metrics-batch-size",
        "5",
    ]);
    assert!(text.contains("== Gantt =="));
    assert!(text.contains("== Memory (LRU, "));
    assert!(text.contains("completed: 4/4"));

    let lines = std::fs::read_to_string(&metrics).unwrap();
    assert!(lines.lines().any(|line| line.starts_with("sim_tick_avg,policy=priority ")));
    assert!(lines
        .lines()
        .any(|line| line.starts_with("sim_summary,policy=priority,replacement=LRU ")));
}

#[test]
fn invalid_configuration_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_simulator"))
        .args(["run", "--random", "2", "--quantum", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
