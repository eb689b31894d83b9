use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn json_output(args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("gstream")
        .args(args)
        .args(["--format", "json"])
        .env_remove("GSTREAM_LOG")
        .output()
        .expect("run gstream");
    assert!(
        output.status.success(),
        "gstream {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json report")
}

#[test]
fn generate_then_inspect_reports_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("g.gs");
    let path_str = path.to_str().unwrap();

    let generated = json_output(&[
        "generate", path_str, "--vertices", "50", "--edges", "200", "--seed", "3",
    ]);
    assert_eq!(generated["vertices"], 50);
    assert_eq!(generated["directed"], false);
    assert_eq!(
        generated["bytes"].as_u64().unwrap(),
        fs::metadata(&path).unwrap().len()
    );

    let inspected = json_output(&["inspect", path_str]);
    assert_eq!(inspected["vertices"], 50);
    assert_eq!(inspected["edges"], generated["edges"]);
    assert!(inspected["max_degree"].as_u64().unwrap() > 0);
}

#[test]
fn run_neighbor_degree_on_directed_image_with_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("d.gs");
    let path_str = path.to_str().unwrap();
    json_output(&[
        "generate", path_str, "--vertices", "40", "--edges", "160", "--directed",
    ]);

    let report = json_output(&[
        "run",
        path_str,
        "--program",
        "neighbor-degree",
        "--io-depth",
        "2",
        "--pull-batch",
        "1",
        "--max-active",
        "4",
        "--schedule-policy",
        "fifo-drain",
        "--delivery-order",
        "reverse",
        "--top",
        "3",
    ]);
    assert_eq!(report["program"], "neighbor-degree");
    assert_eq!(report["options"]["io_depth"], 2);
    assert_eq!(report["options"]["schedule_policy"], "fifo_drain");
    assert_eq!(report["summary"]["vertices"], 40);
    assert_eq!(report["summary"]["allocator"]["live"], 0);
    assert_eq!(report["metrics"]["vertices_completed"], 40);
    assert_eq!(report["metrics"]["requests_failed"], 0);
    assert_eq!(report["top"].as_array().unwrap().len(), 3);
}

#[test]
fn run_reads_config_file_and_text_output() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("u.gs");
    let config = dir.path().join("engine.toml");
    fs::write(&config, "io_depth = 3\npending_order = \"fifo\"\n").unwrap();
    let path_str = path.to_str().unwrap();
    json_output(&["generate", path_str, "--vertices", "10", "--edges", "30"]);

    let report = json_output(&["run", path_str, "--config", config.to_str().unwrap()]);
    assert_eq!(report["program"], "degree");
    assert_eq!(report["options"]["io_depth"], 3);
    assert_eq!(report["options"]["pending_order"], "fifo");
    assert_eq!(report["config"], config.to_str().unwrap());

    let output = cargo_bin_cmd!("gstream")
        .args(["run", path_str, "--config", config.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("Ran degree over 10 vertices"), "{text}");
}

#[test]
fn invalid_override_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("g.gs");
    let path_str = path.to_str().unwrap();
    json_output(&["generate", path_str, "--vertices", "4", "--edges", "4"]);

    let output = cargo_bin_cmd!("gstream")
        .args(["run", path_str, "--io-depth", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("io_depth"), "{stderr}");
}

#[test]
fn missing_image_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.gs");
    cargo_bin_cmd!("gstream")
        .args(["inspect", path.to_str().unwrap()])
        .assert()
        .failure();
}
