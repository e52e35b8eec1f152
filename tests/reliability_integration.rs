#![cfg(unix)]

mod common;

use common::{
    ACCOUNT, CONTRACT_ID, TempWorkspace, parse_jsonl, read_json, stderr_str, stdout_json,
    stdout_str,
};
use serde_json::{Value, json};
use std::fs;
use std::os::unix::fs::PermissionsExt;

fn events<'a>(rows: &'a [Value], name: &str) -> Vec<&'a Value> {
    rows.iter().filter(|r| r["event"] == json!(name)).collect()
}

fn transfer_args() -> String {
    format!(r#"{{"to":"{ACCOUNT}","amount":"5"}}"#)
}

#[test]
fn failing_build_never_reaches_deploy() {
    let ws = TempWorkspace::new("spf-rel");
    let marker = ws.root.join("deployed.marker");
    ws.write_cli(&format!(
        r#"#!/bin/sh
case "$*" in
  "contract build") echo "error[E0425]: cannot find value" >&2; exit 101 ;;
  "contract deploy"*) : > "{}"; echo "{CONTRACT_ID}" ;;
  *) exit 2 ;;
esac
"#,
        marker.display()
    ));
    let contract = ws.root.join("token");
    fs::create_dir_all(&contract).expect("contract dir");

    let out = ws.run(&["deploy", contract.to_str().expect("utf8"), "--json"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!marker.exists(), "deploy ran after a failed build");
    let v = stdout_json(&out);
    assert_eq!(v["success"], json!(false));
    assert_eq!(v["errorKind"], json!("execution"));
    assert!(v["buildOutput"].as_str().unwrap_or("").contains("cannot find value"));
    assert!(!ws.state_file().exists());
}

#[test]
fn build_without_artifact_never_reaches_deploy() {
    let ws = TempWorkspace::new("spf-rel");
    let marker = ws.root.join("deployed.marker");
    ws.write_cli(&format!(
        r#"#!/bin/sh
case "$*" in
  "contract build") echo "Finished release" ;;
  "contract deploy"*) : > "{}" ;;
esac
"#,
        marker.display()
    ));
    let contract = ws.root.join("token");
    fs::create_dir_all(&contract).expect("contract dir");

    let out = ws.run(&["deploy", contract.to_str().expect("utf8")]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!marker.exists());
    assert!(
        stderr_str(&out).contains("Build succeeded but could not locate WASM file"),
        "{}",
        stderr_str(&out)
    );
}

#[test]
fn simulate_timeout_is_reported_and_logged() {
    let ws = TempWorkspace::new("spf-rel");
    ws.write_cli(
        r#"#!/bin/sh
case "$*" in
  "--version") echo "stellar 22.0.1" ;;
  *"--send=no"*) exec sleep 5 ;;
  *) echo "Usage: contract" ;;
esac
"#,
    );
    let args = transfer_args();
    let out = ws.run_with_env(
        &["simulate", CONTRACT_ID, "transfer", "--args", &args],
        &[("SPF_TIMEOUT_SIMULATE_SECS", "1")],
    );
    assert_eq!(out.status.code(), Some(1));
    let stdout = stdout_str(&out);
    assert!(stdout.contains("ERROR: simulate transfer timed out after 1s"), "{stdout}");

    let rows = parse_jsonl(&ws.runs_log());
    let failed = events(&rows, "process.failed");
    assert_eq!(failed.len(), 1, "{rows:?}");
    assert_eq!(failed[0]["timed_out"], json!(true));
}

#[test]
fn missing_cli_explains_how_to_fix_it() {
    let ws = TempWorkspace::new("spf-rel");
    let missing = ws.root.join("nowhere").join("stellar");
    let args = transfer_args();
    let out = ws.run_with_env(
        &["simulate", CONTRACT_ID, "transfer", "--args", &args],
        &[("SPF_CLI_PATH", missing.to_str().expect("utf8")), ("PATH", "/nonexistent")],
    );
    assert_eq!(out.status.code(), Some(1));
    let stdout = stdout_str(&out);
    assert!(
        stdout.contains(&format!("ERROR: Stellar CLI not found at \"{}\".", missing.display())),
        "{stdout}"
    );
    assert!(stdout.contains("HINT: Install Stellar CLI"), "{stdout}");
}

#[test]
fn unreachable_rpc_fails_without_touching_the_cli_invoke() {
    let ws = TempWorkspace::with_mock_cli("spf-rel");
    let args = transfer_args();
    let out = ws.run_with_env(
        &["simulate", CONTRACT_ID, "transfer", "--args", &args, "--rpc", "--json"],
        &[("SPF_RPC_URL", "http://127.0.0.1:9")],
    );
    assert_eq!(out.status.code(), Some(1), "stderr={}", stderr_str(&out));
    let v = stdout_json(&out);
    assert_eq!(v["validation"]["valid"], json!(true));
    assert_eq!(v["simulation"]["strategy"], json!("rpc"));
    assert_eq!(v["simulation"]["success"], json!(false));
    assert_eq!(v["simulation"]["errorKind"], json!("execution"));

    let rows = parse_jsonl(&ws.runs_log());
    assert!(
        rows.iter()
            .filter_map(|r| r["command"].as_str())
            .all(|c| !c.contains("--send=no")),
        "local invoke ran under --rpc"
    );
}

#[test]
fn corrupt_history_blocks_suggest_but_not_validate() {
    let ws = TempWorkspace::with_mock_cli("spf-rel");
    fs::create_dir_all(&ws.state_dir).expect("state dir");
    fs::write(ws.history_file(), "{not json").expect("write history");

    let out = ws.run(&["suggest", CONTRACT_ID]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_str(&out).contains("Reading history"), "{}", stderr_str(&out));

    let args = transfer_args();
    let out = ws.run(&["validate", CONTRACT_ID, "transfer", "--args", &args]);
    assert!(out.status.success(), "stdout={}", stdout_str(&out));
    assert_eq!(fs::read_to_string(ws.history_file()).expect("history"), "{not json");
    let rows = parse_jsonl(&ws.runs_log());
    assert_eq!(events(&rows, "history.load_failed").len(), 1);
}

#[test]
fn readonly_state_dir_keeps_validation_result() {
    let ws = TempWorkspace::with_mock_cli("spf-rel");
    fs::create_dir_all(&ws.state_dir).expect("state dir");
    let mut perms = fs::metadata(&ws.state_dir).expect("meta").permissions();
    perms.set_mode(0o555);
    fs::set_permissions(&ws.state_dir, perms).expect("chmod");

    let args = transfer_args();
    let out = ws.run_with_env(
        &["validate", CONTRACT_ID, "transfer", "--args", &args],
        &[("SPF_LOG", "0")],
    );

    let mut perms = fs::metadata(&ws.state_dir).expect("meta").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&ws.state_dir, perms).expect("restore");

    assert!(out.status.success(), "stderr={}", stderr_str(&out));
    assert!(stdout_str(&out).starts_with("Validation passed"));
}

#[test]
fn unsupported_history_version_is_left_alone() {
    let ws = TempWorkspace::with_mock_cli("spf-rel");
    fs::create_dir_all(&ws.state_dir).expect("state dir");
    fs::write(ws.history_file(), r#"{"version":9,"records":[]}"#).expect("write history");

    let out = ws.run(&["history", "show"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_str(&out).contains("unsupported history version 9"), "{}", stderr_str(&out));
    assert_eq!(read_json(&ws.history_file())["version"], json!(9));
}
