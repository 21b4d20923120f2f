//! End-to-end tests of the `pbilens` binary against a fake `sh` extractor.
#![cfg(unix)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

use pbilens_test::{ModelBuilder, TestWorkspace, three_projects};

fn pbilens(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pbilens").unwrap();
    cmd.arg("--config").arg(config).env_remove("PBILENS_DB");
    cmd
}

/// A workspace whose extractor knows the three fixture projects.
fn fixture_workspace() -> (TestWorkspace, std::path::PathBuf) {
    let ws = TestWorkspace::new();
    for (stem, model) in three_projects() {
        ws.extractor_succeeds(stem, &model);
        ws.write_pbix(stem, stem.as_bytes());
    }
    let config = ws.write_config(5);
    (ws, config)
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn analyze_glob_then_list() {
    let (ws, config) = fixture_workspace();
    let pattern = ws.path().join("reports/*.pbix");

    pbilens(&config)
        .arg("analyze")
        .arg(pattern.to_str().unwrap())
        .assert()
        .success()
        .stdout(predicate::str::contains("stored     A"))
        .stdout(predicate::str::contains("3 stored, 0 unchanged, 0 failed"));

    let list = json_stdout(pbilens(&config).args(["--format", "json", "list"]));
    let mut names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, ["A", "B", "C"]);
    let a = list
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "A")
        .unwrap();
    assert_eq!(a["table_count"], 2);
    assert_eq!(a["measure_count"], 1);
}

#[test]
fn second_analyze_reports_unchanged() {
    let (ws, config) = fixture_workspace();
    let file = ws.path().join("reports/A.pbix");

    pbilens(&config).arg("analyze").arg(&file).assert().success();
    let rows = json_stdout(
        pbilens(&config)
            .args(["--format", "json", "analyze"])
            .arg(&file),
    );
    assert_eq!(rows[0]["status"], "unchanged");
    assert_eq!(rows[0]["project"], "A");
}

#[test]
fn shared_and_search_reports() {
    let (ws, config) = fixture_workspace();
    pbilens(&config)
        .arg("analyze")
        .arg(ws.path().join("reports/*.pbix").to_str().unwrap())
        .assert()
        .success();

    let tables = json_stdout(pbilens(&config).args(["--format", "json", "shared", "tables"]));
    assert_eq!(
        tables,
        serde_json::json!([{"name": "Sales", "project_count": 2, "projects": "A, B"}])
    );

    pbilens(&config)
        .args(["shared", "measures"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total Revenue"))
        .stdout(predicate::str::contains("A, C"));

    let report = json_stdout(pbilens(&config).args(["--format", "json", "search", "sales"]));
    assert_eq!(report["tables"].as_array().unwrap().len(), 2);
    assert_eq!(report["dax_references"][0]["measure"], "Total Revenue");

    pbilens(&config)
        .args(["search", "Region", "--scope", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches"));
}

#[test]
fn show_and_delete_project() {
    let (ws, config) = fixture_workspace();
    pbilens(&config)
        .arg("analyze")
        .arg(ws.path().join("reports/A.pbix"))
        .assert()
        .success();

    pbilens(&config)
        .args(["show", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sales[Total Revenue] = SUM(Sales[Amount])"))
        .stdout(predicate::str::contains("Sales[CustomerID] -> Customer[ID]"));

    pbilens(&config)
        .args(["delete", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted project A"));

    pbilens(&config)
        .args(["show", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Project not found: A"));
}

#[test]
fn clear_requires_confirmation() {
    let (ws, config) = fixture_workspace();
    pbilens(&config)
        .arg("analyze")
        .arg(ws.path().join("reports/*.pbix").to_str().unwrap())
        .assert()
        .success();

    pbilens(&config)
        .arg("clear")
        .assert()
        .failure()
        .stderr(predicate::str::contains("without --yes"));

    pbilens(&config)
        .args(["clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 3 projects"));
}

#[test]
fn extractor_error_exits_with_extraction_code() {
    let ws = TestWorkspace::new();
    ws.extractor_fails("Broken", "File is not a zip file");
    let file = ws.write_pbix("Broken", b"not a zip");
    let config = ws.write_config(5);

    pbilens(&config)
        .arg("analyze")
        .arg(&file)
        .assert()
        .code(5)
        .stderr(predicate::str::contains("File is not a zip file"));

    pbilens(&config)
        .args(["--format", "json", "list"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn hanging_extractor_times_out() {
    let ws = TestWorkspace::new();
    ws.extractor_hangs("Huge");
    let file = ws.write_pbix("Huge", b"big");
    let config = ws.write_config(1);

    pbilens(&config)
        .arg("analyze")
        .arg(&file)
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .code(5)
        .stderr(predicate::str::contains("timed out after 1s"));
}

#[test]
fn mixed_batch_is_partial_success() {
    let ws = TestWorkspace::new();
    ws.extractor_succeeds("Good", &ModelBuilder::new().table("Sales", &["Amount"]).build());
    ws.extractor_fails("Bad", "boom");
    ws.write_pbix("Good", b"good");
    ws.write_pbix("Bad", b"bad");
    let config = ws.write_config(5);

    pbilens(&config)
        .arg("analyze")
        .arg(ws.path().join("reports/*.pbix").to_str().unwrap())
        .assert()
        .code(10)
        .stdout(predicate::str::contains("stored     Good"))
        .stdout(predicate::str::contains("failed     Bad"))
        .stderr(predicate::str::contains("1 of 2 files failed"));
}

#[test]
fn batch_where_every_extraction_fails_exits_with_extraction_code() {
    let ws = TestWorkspace::new();
    ws.extractor_fails("First", "File is not a zip file");
    ws.extractor_fails("Second", "No module named '_sqlite3'");
    ws.write_pbix("First", b"1");
    ws.write_pbix("Second", b"2");
    let config = ws.write_config(5);

    pbilens(&config)
        .arg("analyze")
        .arg(ws.path().join("reports/*.pbix").to_str().unwrap())
        .assert()
        .code(5)
        .stderr(predicate::str::contains("All 2 files failed to analyze"));
}

#[test]
fn missing_config_exits_with_config_code() {
    let ws = TestWorkspace::new();
    pbilens(&ws.path().join("absent.toml"))
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Cannot load config"));
}

#[test]
fn status_counts_projects() {
    let (ws, config) = fixture_workspace();
    pbilens(&config)
        .arg("analyze")
        .arg(ws.path().join("reports/*.pbix").to_str().unwrap())
        .assert()
        .success();

    let status = json_stdout(pbilens(&config).args(["--format", "json", "status"]));
    assert_eq!(status["projects"], 3);
    assert_eq!(status["tables"], 5);

    let network = json_stdout(pbilens(&config).args(["--format", "json", "network"]));
    assert_eq!(network["projects"], 3);
    assert_eq!(network["links"], 1);
}
