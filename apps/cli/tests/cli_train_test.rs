//! Integration tests for the `rlflow train` and `rlflow published` commands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

fn write_table(path: &Path) {
    let mut out = String::new();
    for episode in 0..40 {
        for step in 0..2 {
            let x = f64::from(episode % 8) / 4.0;
            let reward = 1.5 * x + f64::from(step);
            let row = serde_json::json!({
                "mdp_id": format!("mdp-{episode}"),
                "sequence_number": step,
                "state_features": {"x": x, "step": step},
                "reward": reward,
            });
            writeln!(out, "{row}").unwrap();
        }
    }
    std::fs::write(path, out).unwrap();
}

fn write_config(dir: &Path, publish: bool) -> std::path::PathBuf {
    let table = dir.join("events.jsonl");
    write_table(&table);

    let mut config = format!(
        r#"
output_dir = "{runs}"

[table]
table_name = "events"
path = "{table}"
table_sample = 80.0
eval_table_sample = 20.0

[training]
num_epochs = 3
use_gpu = false

[model]
learning_rate = 0.05
batch_size = 8
"#,
        runs = dir.join("runs").display(),
        table = table.display(),
    );
    if publish {
        write!(
            config,
            r#"
[validator]
type = "noop"

[publisher]
type = "file_system"
root = "{}"
"#,
            dir.join("published").display()
        )
        .unwrap();
    }

    let path = dir.join("pipeline.toml");
    std::fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_train_json_output() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), false);

    let mut cmd = Command::cargo_bin("rlflow").unwrap();
    let assert = cmd.arg("train").arg("--config").arg(&config).arg("--json").assert().success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let output: serde_json::Value =
        serde_json::from_str(&stdout).expect("train JSON output should be valid JSON");
    assert_eq!(output["metrics"]["epochs"], 3);
    assert!(output["metrics"]["eval_loss"].is_number());
    let checkpoint = output["output_paths"]["reward_net"].as_str().unwrap();
    assert!(Path::new(checkpoint).is_file());
    assert!(output["publishing_result"].is_null());
}

#[test]
fn test_train_epochs_override() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), false);

    let mut cmd = Command::cargo_bin("rlflow").unwrap();
    let assert = cmd
        .arg("train")
        .arg("--config")
        .arg(&config)
        .args(["--epochs", "1", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let output: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(output["metrics"]["epochs"], 1);
}

#[test]
fn test_train_then_list_published() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), true);

    let mut cmd = Command::cargo_bin("rlflow").unwrap();
    cmd.arg("train")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Training complete"))
        .stdout(predicate::str::contains("Publisher:  file_system"));

    let mut cmd = Command::cargo_bin("rlflow").unwrap();
    cmd.arg("published")
        .arg("--root")
        .arg(temp.path().join("published"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Published Models (1)"))
        .stdout(predicate::str::contains("linear_reward"));
}

#[test]
fn test_train_missing_config_fails() {
    let temp = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("rlflow").unwrap();
    cmd.arg("train")
        .arg("--config")
        .arg(temp.path().join("missing.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load pipeline config"));
}

#[test]
fn test_published_empty_registry() {
    let temp = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("rlflow").unwrap();
    cmd.arg("published")
        .arg("--root")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No published models found."));
}
