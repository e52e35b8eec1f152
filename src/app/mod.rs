use std::env;

use serde_json::json;

use crate::cmdctx::CmdCtx;
use crate::config::{APP_DESC, APP_NAME, APP_VERSION, AppConfig};
use crate::contract_cmds::{
    cmd_build, cmd_deploy, cmd_function, cmd_functions, cmd_simulate, cmd_suggest, cmd_validate,
};
use crate::doctor::cmd_doctor;
use crate::error::{EXIT_OK, EXIT_USAGE, format_error};
use crate::history_cmds::cmd_history;
use crate::interactive::cmd_interactive;
use crate::parse_cmds::{cmd_parse_build, cmd_parse_deploy, cmd_parse_help};
use crate::paths::resolve_log_file;
use crate::process::ProcessRunner;
use crate::runlog::{Level, LogEvent, RunLog};
use crate::settings_cmds::cmd_config;
use crate::state::read_state_value;

#[cfg(test)]
mod tests;

type Handler = fn(&CmdCtx, &[String]) -> i32;

const COMMANDS: [(&str, Handler); 14] = [
    ("functions", cmd_functions),
    ("function", cmd_function),
    ("validate", cmd_validate),
    ("simulate", cmd_simulate),
    ("build", cmd_build),
    ("deploy", cmd_deploy),
    ("suggest", cmd_suggest),
    ("history", cmd_history),
    ("parse-help", cmd_parse_help),
    ("parse-deploy", cmd_parse_deploy),
    ("parse-build", cmd_parse_build),
    ("interactive", cmd_interactive),
    ("config", cmd_config),
    ("doctor", doctor),
];

fn doctor(ctx: &CmdCtx, args: &[String]) -> i32 {
    if !args.is_empty() {
        eprintln!("Usage: {} doctor", ctx.app_name);
        return EXIT_USAGE;
    }
    cmd_doctor(ctx)
}

fn print_help() {
    println!("{APP_NAME} - {APP_DESC}");
    println!();
    println!("Usage:");
    println!("  {APP_NAME} <command> [args]");
    println!();
    println!("Commands:");
    println!("  functions <contract-id> [--json]      List functions from the contract help");
    println!("  function <contract-id> <name> [--json]  Show one function's parameters");
    println!("  validate <contract-id> <function> [--args JSON] [--json]");
    println!("                                        Pre-flight check a call without running it");
    println!("  simulate <contract-id> <function> [--args JSON] [--rpc|--local] [--network N] [--yes] [--json]");
    println!("                                        Validate, then simulate the call");
    println!("  build <contract-path> [--json]        Build a contract and locate its WASM");
    println!("  deploy <contract-path> [--json]       Build, then deploy the located WASM");
    println!("  deploy --wasm <file> [--json]         Deploy an existing WASM file");
    println!("  suggest <contract-id> [--function F --param P [--type T]] [--input PREFIX] [--json]");
    println!("                                        Rank autocomplete candidates");
    println!("  history <show [contract-id]|clear>    Show or clear remembered inputs");
    println!("  parse-help [--function NAME]          Parse CLI help text from stdin");
    println!("  parse-deploy                          Parse deploy output from stdin");
    println!("  parse-build <contract-path>           Locate the WASM named by build output on stdin");
    println!("  interactive                           Assemble and simulate a call step by step");
    println!("  config <show|set <key> <value>|unset <key>>  Manage saved preferences");
    println!("  doctor                                Check CLI, configuration and state directory");
    println!("  version                               Print tool version");
    println!("  help                                  Print this help");
}

fn print_version(ctx: &CmdCtx) {
    println!("{} {}", ctx.app_name, ctx.app_version);
}

pub fn dispatch(ctx: &CmdCtx, args: &[String]) -> i32 {
    let cmd = args.first().map(String::as_str).unwrap_or("help");
    let rest = args.get(1..).unwrap_or_default();
    match cmd {
        "help" | "--help" | "-h" => {
            print_help();
            EXIT_OK
        }
        "version" | "--version" | "-V" => {
            print_version(ctx);
            EXIT_OK
        }
        _ => match COMMANDS.iter().find(|(name, _)| *name == cmd) {
            Some((name, handler)) => {
                ctx.log.info("command.started", *name);
                handler(ctx, rest)
            }
            None => {
                eprintln!(
                    "{}",
                    format_error(ctx.app_name, &format!("unknown command '{cmd}'"))
                );
                eprintln!("Run '{} help' for usage.", ctx.app_name);
                EXIT_USAGE
            }
        },
    }
}

pub fn run() -> i32 {
    let args: Vec<String> = env::args().skip(1).collect();
    let state = read_state_value();
    let config = AppConfig::from_env_and_state(state.as_ref());
    let log_path = if config.log_enabled {
        resolve_log_file()
    } else {
        None
    };
    let log = RunLog::open(log_path, config.verbose);
    let runner = ProcessRunner::new(config.max_output_bytes);
    let ctx = CmdCtx {
        app_name: APP_NAME,
        app_version: APP_VERSION,
        config: &config,
        runner: &runner,
        log: &log,
    };
    let code = dispatch(&ctx, &args);
    log.record(
        LogEvent::new("command.finished", Level::Info, format!("exit {code}"))
            .data(json!({ "exit_code": code })),
    );
    log.close();
    code
}
