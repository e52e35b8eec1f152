use super::*;
use crate::config::AppConfig;
use crate::error::{EXIT_RUNTIME, EXIT_VALIDATION};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn with_ctx<T>(config: AppConfig, f: impl FnOnce(&CmdCtx) -> T) -> T {
    let runner = ProcessRunner::new(4096);
    let log = RunLog::disabled();
    let ctx = CmdCtx {
        app_name: APP_NAME,
        app_version: APP_VERSION,
        config: &config,
        runner: &runner,
        log: &log,
    };
    f(&ctx)
}

#[test]
fn command_table_names_are_unique() {
    let mut names: Vec<&str> = COMMANDS.iter().map(|(n, _)| *n).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), COMMANDS.len());
}

#[test]
fn help_and_version_succeed() {
    with_ctx(AppConfig::default(), |ctx| {
        assert_eq!(dispatch(ctx, &[]), EXIT_OK);
        assert_eq!(dispatch(ctx, &args(&["help"])), EXIT_OK);
        assert_eq!(dispatch(ctx, &args(&["--version"])), EXIT_OK);
    });
}

#[test]
fn unknown_command_is_usage_error() {
    with_ctx(AppConfig::default(), |ctx| {
        assert_eq!(dispatch(ctx, &args(&["frobnicate"])), EXIT_USAGE);
    });
}

#[test]
fn bad_arity_is_usage_error() {
    with_ctx(AppConfig::default(), |ctx| {
        assert_eq!(dispatch(ctx, &args(&["functions"])), EXIT_USAGE);
        assert_eq!(dispatch(ctx, &args(&["deploy", "--wasm"])), EXIT_USAGE);
        assert_eq!(dispatch(ctx, &args(&["parse-build"])), EXIT_USAGE);
    });
}

#[test]
fn invalid_config_refuses_execution() {
    let config = AppConfig {
        cli_path: String::new(),
        ..AppConfig::default()
    };
    with_ctx(config, |ctx| {
        assert_eq!(dispatch(ctx, &args(&["build", "."])), EXIT_RUNTIME);
    });
}

#[test]
fn malformed_contract_id_blocks_simulation() {
    let config = AppConfig {
        cli_path: "/nonexistent/stellar".to_string(),
        ..AppConfig::default()
    };
    with_ctx(config, |ctx| {
        assert_eq!(
            dispatch(ctx, &args(&["simulate", "not-a-contract", "transfer", "--yes"])),
            EXIT_VALIDATION
        );
    });
}
