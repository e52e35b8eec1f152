use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

const STATE_DIR_NAME: &str = ".stellar-preflight";

/// Binary names the on-disk search looks for, in preference order.
pub const CLI_BINARY_NAMES: [&str; 2] = ["stellar", "soroban"];

pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

pub fn repo_root() -> Option<PathBuf> {
    static CACHED: OnceLock<Option<PathBuf>> = OnceLock::new();
    CACHED.get_or_init(repo_root_uncached).as_ref().cloned()
}

fn repo_root_uncached() -> Option<PathBuf> {
    let out = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(PathBuf::from(s))
    }
}

/// `SPF_STATE_DIR`, else the git workspace, else the home directory.
pub fn resolve_state_dir() -> Option<PathBuf> {
    if let Ok(v) = env::var("SPF_STATE_DIR")
        && !v.trim().is_empty()
    {
        return Some(PathBuf::from(v));
    }
    if let Some(root) = repo_root() {
        return Some(root.join(STATE_DIR_NAME));
    }
    home_dir().map(|h| h.join(STATE_DIR_NAME))
}

pub fn resolve_state_file() -> Option<PathBuf> {
    resolve_state_dir().map(|d| d.join("state.json"))
}

pub fn resolve_history_file() -> Option<PathBuf> {
    resolve_state_dir().map(|d| d.join("history.json"))
}

pub fn resolve_log_file() -> Option<PathBuf> {
    resolve_state_dir().map(|d| d.join("logs").join("runs.jsonl"))
}

/// Install locations prepended to the child search path, highest priority first.
pub fn toolchain_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = home_dir() {
        dirs.push(home.join(".cargo").join("bin"));
        dirs.push(home.join(".local").join("bin"));
    }
    dirs.push(PathBuf::from("/usr/local/bin"));
    dirs.push(PathBuf::from("/opt/homebrew/bin"));
    dirs.push(PathBuf::from("/opt/homebrew/sbin"));
    dirs
}

/// Best-effort on-disk search for the CLI binary; never consulted for execution.
pub fn find_cli_path() -> Option<PathBuf> {
    let mut dirs = toolchain_dirs();
    if let Some(path) = env::var_os("PATH") {
        dirs.extend(env::split_paths(&path));
    }
    find_binary_in(&dirs, &CLI_BINARY_NAMES)
}

pub fn find_binary_in(dirs: &[PathBuf], names: &[&str]) -> Option<PathBuf> {
    for name in names {
        for dir in dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

pub fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| format!("failed to create {}: {e}", parent.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn toolchain_dirs_keep_fixed_priority() {
        let dirs = toolchain_dirs();
        let tail: Vec<&str> = dirs
            .iter()
            .rev()
            .take(3)
            .map(|p| p.to_str().unwrap_or_default())
            .collect();
        assert_eq!(tail, vec!["/opt/homebrew/sbin", "/opt/homebrew/bin", "/usr/local/bin"]);
    }

    #[test]
    fn find_binary_prefers_name_order_then_dir_order() {
        let a = tempdir().expect("tempdir a");
        let b = tempdir().expect("tempdir b");
        fs::write(a.path().join("soroban"), "").expect("write soroban");
        fs::write(b.path().join("stellar"), "").expect("write stellar");
        let dirs = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        let found = find_binary_in(&dirs, &CLI_BINARY_NAMES).expect("found");
        assert_eq!(found, b.path().join("stellar"));
    }

    #[test]
    fn find_binary_returns_none_when_absent() {
        let a = tempdir().expect("tempdir");
        assert!(find_binary_in(&[a.path().to_path_buf()], &CLI_BINARY_NAMES).is_none());
    }
}
