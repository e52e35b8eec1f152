use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cmdctx::CmdCtx;
use crate::error::{EXIT_OK, EXIT_RUNTIME};
use crate::execmeta::utc_now_millis;
use crate::paths::{find_cli_path, resolve_state_dir};
use crate::process::ProcessRequest;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates the directory if needed and round-trips a probe file through it.
pub fn check_writable(dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
    let probe = dir.join(format!(".doctor-{}-{}", std::process::id(), utc_now_millis()));
    fs::write(&probe, b"ok").map_err(|e| format!("cannot write in {}: {e}", dir.display()))?;
    fs::remove_file(&probe).map_err(|e| format!("cannot remove {}: {e}", probe.display()))
}

fn probe_cli(ctx: &CmdCtx) -> Result<String, String> {
    let req = ProcessRequest::new(&ctx.config.cli_path, vec!["--version".to_string()], VERSION_PROBE_TIMEOUT)
        .label("cli version");
    match ctx.runner.run(&req) {
        Ok(out) => {
            ctx.log.process_finished(&req, &out);
            let first = out.combined().lines().next().unwrap_or("").trim().to_string();
            if out.success {
                Ok(first)
            } else {
                Err(format!("exited with {:?}: {first}", out.exit_code))
            }
        }
        Err(e) => {
            ctx.log.process_failed(&req, &e);
            Err(e.to_string())
        }
    }
}

pub fn cmd_doctor(ctx: &CmdCtx) -> i32 {
    let cfg = ctx.config;
    let mut failures = 0;

    println!("== {} doctor ==", ctx.app_name);
    match probe_cli(ctx) {
        Ok(version) => println!("OK: {} ({version})", cfg.cli_path),
        Err(e) => {
            println!("MISSING: {} ({e})", cfg.cli_path);
            match find_cli_path() {
                Some(found) => println!(
                    "WARN: a Stellar CLI exists at {}; run '{} config set cli_path {}'",
                    found.display(),
                    ctx.app_name,
                    found.display()
                ),
                None => println!("WARN: install Stellar CLI: https://developers.stellar.org/docs/tools/cli"),
            }
            if cfg.use_local_cli {
                failures += 1;
            }
        }
    }

    println!();
    println!("== configuration ==");
    println!("cli_path: {}", cfg.cli_path);
    println!("source: {}", cfg.source);
    println!("network: {}", cfg.network);
    println!(
        "strategy: {}",
        if cfg.use_local_cli { "local-cli" } else { "rpc" }
    );
    println!("rpc_url: {}", cfg.rpc_url);
    let problems = cfg.validate();
    if problems.is_empty() {
        println!("OK: configuration is valid");
    }
    for p in &problems {
        println!("FAIL: {p}");
        failures += 1;
    }

    println!();
    println!("== state ==");
    match resolve_state_dir() {
        Some(dir) => {
            println!("state_dir: {}", dir.display());
            match check_writable(&dir) {
                Ok(()) => println!("OK: state directory is writable"),
                Err(e) => {
                    println!("FAIL: {e}");
                    failures += 1;
                }
            }
        }
        None => {
            println!("FAIL: unable to resolve a state directory (set SPF_STATE_DIR or HOME)");
            failures += 1;
        }
    }
    match ctx.log.path() {
        Some(p) => println!("log_file: {}", p.display()),
        None => println!("log_file: <disabled>"),
    }

    if failures > 0 {
        println!();
        println!("FAIL: {failures} problem(s) found.");
        return EXIT_RUNTIME;
    }
    EXIT_OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writable_dir_passes_and_leaves_no_probe() {
        let dir = tempdir().expect("tempdir");
        let state = dir.path().join("nested");
        check_writable(&state).expect("writable");
        assert_eq!(fs::read_dir(&state).expect("read dir").count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn readonly_dir_fails() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().expect("tempdir");
        let mut perms = fs::metadata(dir.path()).expect("meta").permissions();
        perms.set_mode(0o555);
        fs::set_permissions(dir.path(), perms).expect("chmod");
        let res = check_writable(dir.path());
        let mut perms = fs::metadata(dir.path()).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(dir.path(), perms).expect("restore");
        // root ignores directory permissions
        if res.is_ok() {
            return;
        }
        assert!(res.unwrap_err().contains("cannot write"));
    }
}
