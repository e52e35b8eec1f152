#![allow(dead_code)]

use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const CONTRACT_ID: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";
pub const ACCOUNT: &str = "GDIY6AQQ75WMD4W46EYB7O6UYMHOCGQHLAQGQTKHDX4J2DYQCHVCQYFD";
pub const TX_HASH: &str = "9f2c4e8a1b3d5f7091a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f708";

/// A mock `stellar` answering the commands the tool issues.
pub const MOCK_CLI: &str = r#"#!/bin/sh
case "$*" in
  "--version") echo "stellar 22.0.1" ;;
  *"-- --help") printf 'Usage: contract [COMMAND]\n\nCommands:\n  transfer  Transfer tokens\n  balance  Read a balance\n  help  Print this message\n\nOptions:\n  -h, --help  Print help\n' ;;
  *"-- transfer --help") printf 'Usage: transfer [OPTIONS]\n\nOptions:\n  --to <Address>  Recipient\n  --amount <i128>  Amount to send\n  -h, --help  Print help\n' ;;
  *"-- balance --help") printf 'Usage: balance [OPTIONS]\n\nOptions:\n  --id <Address>  Account\n' ;;
  *"--send=no -- transfer"*) echo "Simulating transaction"; echo '"ok"' ;;
  *"--send=no -- balance"*) echo "error: HostError: Error(Contract, #6)" >&2; exit 1 ;;
  "contract build") mkdir -p target/wasm32v1-none/release && : > target/wasm32v1-none/release/token.wasm && echo 'Wasm File: target/wasm32v1-none/release/token.wasm' ;;
  "contract deploy"*) echo "Transaction hash is 9f2c4e8a1b3d5f7091a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f708"; echo "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC" ;;
  *) echo "error: unexpected arguments: $*" >&2; exit 2 ;;
esac
"#;

pub struct TempWorkspace {
    pub root: PathBuf,
    pub home: PathBuf,
    pub state_dir: PathBuf,
    pub mock_bin: PathBuf,
}

impl TempWorkspace {
    pub fn new(prefix: &str) -> Self {
        let base = std::env::temp_dir();
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let root = base.join(format!("{prefix}-ws-{}-{ts}", std::process::id()));
        let home = root.join("home");
        let state_dir = root.join("state");
        let mock_bin = root.join("bin");
        fs::create_dir_all(&home).expect("create temp home dir");
        fs::create_dir_all(&mock_bin).expect("create mock bin dir");
        Self {
            root,
            home,
            state_dir,
            mock_bin,
        }
    }

    /// A workspace whose `stellar` is [`MOCK_CLI`].
    pub fn with_mock_cli(prefix: &str) -> Self {
        let ws = Self::new(prefix);
        ws.write_cli(MOCK_CLI);
        ws
    }

    pub fn cli_path(&self) -> PathBuf {
        self.mock_bin.join("stellar")
    }

    pub fn write_cli(&self, body: &str) {
        let p = self.cli_path();
        fs::write(&p, body).expect("write mock");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&p).expect("mock metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&p, perms).expect("set mock executable");
        }
    }

    pub fn command(&self, args: &[&str], envs: &[(&str, &str)]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_stellar-preflight"));
        cmd.args(args)
            .current_dir(&self.root)
            .env("HOME", &self.home)
            .env("SPF_STATE_DIR", &self.state_dir)
            .env("SPF_CLI_PATH", self.cli_path())
            .env("SPF_LOG", "1")
            .env_remove("SPF_SOURCE")
            .env_remove("SPF_NETWORK")
            .env_remove("SPF_RPC_URL")
            .env_remove("SPF_USE_LOCAL_CLI")
            .env_remove("SPF_VERBOSE");
        for (k, v) in envs {
            cmd.env(k, v);
        }
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_env(args, &[])
    }

    pub fn run_with_env(&self, args: &[&str], envs: &[(&str, &str)]) -> Output {
        self.command(args, envs)
            .stdin(Stdio::null())
            .output()
            .expect("run stellar-preflight")
    }

    pub fn run_with_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args, &[])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn stellar-preflight");
        child
            .stdin
            .take()
            .expect("stdin pipe")
            .write_all(input.as_bytes())
            .expect("write stdin");
        child.wait_with_output().expect("wait stellar-preflight")
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    pub fn history_file(&self) -> PathBuf {
        self.state_dir.join("history.json")
    }

    pub fn runs_log(&self) -> PathBuf {
        self.state_dir.join("logs").join("runs.jsonl")
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

pub fn stdout_str(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

pub fn stderr_str(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

pub fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).expect("read json");
    serde_json::from_str::<Value>(&text).expect("parse json")
}

pub fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {}", stdout_str(out))
    })
}

pub fn parse_jsonl(path: &Path) -> Vec<Value> {
    let text = fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| serde_json::from_str::<Value>(line).expect("valid json line"))
        .collect()
}
