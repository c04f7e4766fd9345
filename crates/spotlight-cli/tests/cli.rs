use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FIXTURE: &str = r#"{
    "queries": {
        "kMDItemContentType == 'public.folder'": {
            "updates": 1,
            "results": [
                { "kMDItemDisplayName": "Documents", "kMDItemPath": "/Users/me/Documents" },
                { "kMDItemDisplayName": "Downloads", "kMDItemPath": "/Users/me/Downloads" },
                { "kMDItemDisplayName": "Desktop", "kMDItemPath": "/Users/me/Desktop" }
            ]
        },
        "kMDItemFSName == 'locked'": { "denied": true }
    }
}"#;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fixture.json"), FIXTURE).unwrap();
        Self { dir }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("spotlight").unwrap();
        cmd.env("SPOTLIGHT_CONFIG", self.dir.path().join("config.toml"))
            .env_remove("RUST_LOG");
        cmd
    }

    fn search(&self, query: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("search")
            .arg(query)
            .arg("--fixture")
            .arg(self.dir.path().join("fixture.json"))
            .args(["--interval-ms", "5", "--timeout", "5"]);
        cmd
    }
}

#[test]
fn test_search_prints_results_in_order() {
    let env = Env::new();
    env.search("kMDItemContentType == 'public.folder'")
        .assert()
        .success()
        .stdout("Documents\nDownloads\nDesktop\n");
}

#[test]
fn test_search_attribute_and_limit() {
    let env = Env::new();
    env.search("kMDItemContentType == 'public.folder'")
        .args(["--attribute", "kMDItemPath", "--limit", "1"])
        .assert()
        .success()
        .stdout("/Users/me/Documents\n... 2 more\n");
}

#[test]
fn test_search_json_output() {
    let env = Env::new();
    let output = env
        .search("kMDItemContentType == 'public.folder'")
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["results"].as_array().unwrap().len(), 3);
    assert_eq!(report["summary"]["total"], 3);
    assert_eq!(report["summary"]["updates"], 1);
}

#[test]
fn test_search_csv_output() {
    let env = Env::new();
    env.search("kMDItemContentType == 'public.folder'")
        .args(["--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("index,kMDItemDisplayName\n0,Documents\n"));
}

#[test]
fn test_search_without_matches() {
    let env = Env::new();
    env.search("kMDItemFSName == 'missing'")
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found"));
}

#[test]
fn test_search_errors() {
    let env = Env::new();
    env.search("kMDItemFSName == 'unterminated")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid predicate"));
    env.search("kMDItemFSName == 'locked'")
        .assert()
        .failure()
        .stderr(predicate::str::contains("search failed"));
}

#[cfg(unix)]
#[test]
fn test_index_failure_is_reported_without_waiting_for_timeout() {
    let env = Env::new();
    // `sh -0` rejects the option and exits non-zero, like a broken index.
    env.cmd()
        .args(["config", "set", "mdfind_path", "/bin/sh"])
        .assert()
        .success();
    env.cmd()
        .args(["search", "kMDItemFSName == 'x'", "--interval-ms", "5", "--timeout", "120"])
        .timeout(Duration::from_secs(20))
        .assert()
        .failure()
        .stderr(predicate::str::contains("search failed"))
        .stderr(predicate::str::contains("mdfind exited"))
        .stderr(predicate::str::contains("timed out").not());
}

#[test]
fn test_missing_fixture() {
    let env = Env::new();
    env.cmd()
        .args(["search", "x", "--fixture"])
        .arg(env.dir.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading fixture"));
}

#[test]
fn test_config_set_get() {
    let env = Env::new();
    env.cmd()
        .args(["config", "set", "timeout_secs", "7"])
        .assert()
        .success();
    env.cmd()
        .args(["config", "get", "timeout_secs"])
        .assert()
        .success()
        .stdout("7\n");
    env.cmd()
        .args(["config", "set", "poll_interval_ms", "0"])
        .assert()
        .failure();
    env.cmd()
        .args(["config", "get", "colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_config_list_shows_effective_query() {
    let env = Env::new();
    env.cmd()
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"))
        .stdout(predicate::str::contains("attribute: kMDItemDisplayName"))
        .stdout(predicate::str::contains("poll interval: 50ms"))
        .stdout(predicate::str::contains("valid: yes"));

    env.cmd()
        .args(["config", "set", "attribute", "kMDItemPath"])
        .assert()
        .success();
    env.cmd()
        .args(["config", "set", "run_timeout_ms", "20"])
        .assert()
        .success();
    env.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("attribute: kMDItemPath"))
        .stdout(predicate::str::contains("run-loop wait: 20ms"));
}

#[test]
fn test_config_rejects_invalid_query_settings() {
    let env = Env::new();
    env.cmd()
        .args(["config", "set", "run_timeout_ms", "5000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Run-loop timeout too long"));
    env.cmd()
        .args(["config", "set", "format", "yaml"])
        .assert()
        .failure();
    env.cmd()
        .args(["config", "get", "run_timeout_ms"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_config_unset() {
    let env = Env::new();
    env.cmd()
        .args(["config", "set", "format", "json"])
        .assert()
        .success();
    env.cmd()
        .args(["config", "unset", "format"])
        .assert()
        .success()
        .stdout("format = table\n");
    env.cmd()
        .args(["config", "get", "mdfind_path"])
        .assert()
        .success()
        .stdout("(not set)\n");
}

#[test]
fn test_config_init_and_path() {
    let env = Env::new();
    let path = env.dir.path().join("config.toml");
    env.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
    env.cmd().args(["config", "init"]).assert().success();
    assert!(path.exists());
    env.cmd().args(["config", "init"]).assert().failure();
    env.cmd()
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_configured_format_applies() {
    let env = Env::new();
    env.cmd()
        .args(["config", "set", "format", "csv"])
        .assert()
        .success();
    env.search("kMDItemContentType == 'public.folder'")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("index,"));
}

#[test]
fn test_completions() {
    let env = Env::new();
    env.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("spotlight"));
}

#[test]
fn test_completions_into_directory() {
    let env = Env::new();
    let out = env.dir.path().join("completions");
    env.cmd()
        .args(["completions", "zsh", "--dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("_spotlight"));
    assert!(out.join("_spotlight").exists());
}
