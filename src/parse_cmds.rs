//! Offline entry points: interpret CLI output captured elsewhere.

use std::io::{self, Read};
use std::path::PathBuf;

use serde_json::{Value, json};

use crate::cmdctx::CmdCtx;
use crate::deploy_output::{parse_build_output, to_deployment_result};
use crate::error::{EXIT_OK, EXIT_RUNTIME, EXIT_USAGE};
use crate::help_parser::{ClapHelpParser, HelpParse, HelpParser};
use crate::util::print_json;

fn read_stdin(ctx: &CmdCtx, command: &str) -> Option<String> {
    let mut text = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut text) {
        eprintln!("{} {command}: failed to read stdin: {e}", ctx.app_name);
        return None;
    }
    Some(text)
}

/// `HelpParse` as printed by `parse-help`: parsed functions, or the raw text
/// flagged as unrecognised.
pub fn help_parse_json(parsed: &HelpParse) -> Value {
    match parsed {
        HelpParse::Parsed(functions) => json!({ "parsed": true, "functions": functions }),
        HelpParse::Unparsed { raw } => json!({ "parsed": false, "functions": [], "raw": raw }),
    }
}

pub fn cmd_parse_help(ctx: &CmdCtx, args: &[String]) -> i32 {
    let function = match args {
        [] => None,
        [flag, name] if flag == "--function" && !name.trim().is_empty() => Some(name.trim()),
        _ => {
            eprintln!("Usage: {} parse-help [--function NAME] < help.txt", ctx.app_name);
            return EXIT_USAGE;
        }
    };
    let Some(text) = read_stdin(ctx, "parse-help") else {
        return EXIT_RUNTIME;
    };
    let parser = ClapHelpParser;
    let ok = match function {
        Some(name) => print_json("parse-help", &parser.parse_function_help(name, &text)),
        None => print_json("parse-help", &help_parse_json(&parser.parse_functions(&text))),
    };
    if ok { EXIT_OK } else { EXIT_RUNTIME }
}

pub fn cmd_parse_deploy(ctx: &CmdCtx, args: &[String]) -> i32 {
    if !args.is_empty() {
        eprintln!("Usage: {} parse-deploy < deploy.txt", ctx.app_name);
        return EXIT_USAGE;
    }
    let Some(text) = read_stdin(ctx, "parse-deploy") else {
        return EXIT_RUNTIME;
    };
    let result = to_deployment_result(&text);
    print_json("parse-deploy", &result);
    if result.success { EXIT_OK } else { EXIT_RUNTIME }
}

pub fn cmd_parse_build(ctx: &CmdCtx, args: &[String]) -> i32 {
    let [path] = args else {
        eprintln!("Usage: {} parse-build <contract-path> < build.txt", ctx.app_name);
        return EXIT_USAGE;
    };
    let Some(text) = read_stdin(ctx, "parse-build") else {
        return EXIT_RUNTIME;
    };
    let artifact = parse_build_output(&text, &PathBuf::from(path));
    print_json("parse-build", &artifact);
    if artifact.wasm_path.is_some() { EXIT_OK } else { EXIT_RUNTIME }
}
