//! The `solkit` binary on solution files.

use assert_cmd::Command;
use predicates::prelude::*;
use solkit_cli::core::Item;
use solkit_cli::solution::Solution;
use solkit_cli::templating::templatize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn solkit(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("solkit").unwrap();
    cmd.arg("--no-progress")
        .arg("--config")
        .arg(config_dir.join("config.toml"))
        .env("NO_COLOR", "1")
        .env_remove("SOLKIT_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write_solution(dir: &Path, layout: &[(&str, &str, &[&str])]) -> PathBuf {
    let items = layout
        .iter()
        .map(|(id, kind, deps)| {
            Item::new(*id, *kind).with_dependencies(deps.iter().map(|d| templatize(d)))
        })
        .collect();
    let path = dir.join("solution.json");
    Solution::new("cli test", items).save(&path).unwrap();
    path
}

fn app_stack(dir: &Path) -> PathBuf {
    write_solution(
        dir,
        &[
            ("wma", "Web Mapping Application", &["map"]),
            ("map", "Web Map", &["svc"]),
            ("svc", "Feature Service", &[]),
        ],
    )
}

#[test]
fn test_order_prints_numbered_build_order() {
    let temp = TempDir::new().unwrap();
    let path = app_stack(temp.path());

    solkit(temp.path())
        .arg("order")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1. svc (Feature Service)"))
        .stdout(predicate::str::contains("3. wma (Web Mapping Application)"));
}

#[test]
fn test_order_json() {
    let temp = TempDir::new().unwrap();
    let path = app_stack(temp.path());

    let output = solkit(temp.path()).arg("order").arg(&path).arg("--json").output().unwrap();
    assert!(output.status.success());
    let order: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(order, vec!["svc", "map", "wma"]);
}

#[test]
fn test_tree_formats() {
    let temp = TempDir::new().unwrap();
    let path = app_stack(temp.path());

    solkit(temp.path())
        .args(["tree", "--format", "text"])
        .arg(&path)
        .assert()
        .success()
        .stdout("wma\n  map\n    svc\n");

    solkit(temp.path())
        .arg("tree")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("wma (Web Mapping Application)"))
        .stdout(predicate::str::contains("└── map (Web Map)"));

    let output = solkit(temp.path()).args(["tree", "--format", "json"]).arg(&path).output().unwrap();
    let roots: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(roots[0]["id"], "wma");
    assert_eq!(roots[0]["dependencies"][0]["dependencies"][0]["id"], "svc");
}

#[test]
fn test_tree_strict_fails_on_missing_dependency() {
    let temp = TempDir::new().unwrap();
    let path = write_solution(temp.path(), &[("map", "Web Map", &["gone"])]);

    solkit(temp.path())
        .arg("tree")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("not in the solution: gone"));

    solkit(temp.path())
        .args(["tree", "--strict"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("gone"));
}

#[test]
fn test_validate() {
    let temp = TempDir::new().unwrap();
    let path = app_stack(temp.path());

    solkit(temp.path())
        .args(["validate", "--show-order"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid (3 item(s))"))
        .stdout(predicate::str::contains("Build order: svc → map → wma"));
}

#[test]
fn test_validate_reports_cycle() {
    let temp = TempDir::new().unwrap();
    let path = write_solution(temp.path(), &[("a", "Thing", &["b"]), ("b", "Thing", &["a"])]);

    solkit(temp.path())
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("dependency cycle: a → b → a"))
        .stderr(predicate::str::contains("1 issue(s) found"));
}

#[test]
fn test_missing_solution_file() {
    let temp = TempDir::new().unwrap();
    solkit(temp.path())
        .arg("order")
        .arg(temp.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.json"));
}

#[test]
fn test_config_init_and_show_hide_tokens() {
    let temp = TempDir::new().unwrap();

    solkit(temp.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created global config"));
    assert!(temp.path().join("config.toml").exists());

    solkit(temp.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prod"))
        .stdout(predicate::str::contains("YOUR_TOKEN").not());

    solkit(temp.path())
        .args(["config", "add-portal", "staging", "https://staging.example.com/sharing/rest", "me"])
        .assert()
        .success();
    let written = std::fs::read_to_string(temp.path().join("config.toml")).unwrap();
    assert!(written.contains("staging"));
}
