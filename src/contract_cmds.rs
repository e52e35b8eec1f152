use std::path::PathBuf;

use serde_json::{Map, Value, json};

use crate::args::parse_args_object;
use crate::autocomplete::{AutocompleteEngine, SuggestionContext};
use crate::cmdctx::CmdCtx;
use crate::deployer::Deployer;
use crate::error::{EXIT_OK, EXIT_RUNTIME, EXIT_USAGE, EXIT_VALIDATION, format_error};
use crate::execmeta::utc_now_millis;
use crate::inspector::{CLAP_HELP_COMMAND, ContractInspector, SchemaSource};
use crate::state::{last_contract_id, remember_contract_id};
use crate::strategy::select_strategy;
use crate::types::{
    ContractCall, ContractFunctionSchema, DeploymentResult, HistoryEntry, SimulationResult,
    ValidationReport,
};
use crate::util::print_json;
use crate::validator::{is_valid_contract_id, validate};

struct CallArgs {
    contract_id: String,
    function_name: String,
    args: Map<String, Value>,
    use_local_cli: Option<bool>,
    network: Option<String>,
    yes: bool,
    json_out: bool,
}

fn call_usage(app_name: &str, command: &str) -> String {
    match command {
        "simulate" => format!(
            "{app_name} simulate <contract-id> <function> [--args JSON] [--rpc|--local] [--network N] [--yes] [--json]"
        ),
        _ => format!("{app_name} {command} <contract-id> <function> [--args JSON] [--json]"),
    }
}

fn parse_call_args(app_name: &str, command: &str, args: &[String]) -> Result<CallArgs, i32> {
    let usage = call_usage(app_name, command);
    let simulate = command == "simulate";
    let mut positional = Vec::new();
    let mut raw_args: Option<String> = None;
    let mut out = CallArgs {
        contract_id: String::new(),
        function_name: String::new(),
        args: Map::new(),
        use_local_cli: None,
        network: None,
        yes: false,
        json_out: false,
    };
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => out.json_out = true,
            "--args" => {
                let Some(v) = args.get(i + 1) else {
                    eprintln!("Usage: {usage}");
                    return Err(EXIT_USAGE);
                };
                raw_args = Some(v.clone());
                i += 1;
            }
            "--network" if simulate => {
                let Some(v) = args.get(i + 1).filter(|v| !v.trim().is_empty()) else {
                    eprintln!("Usage: {usage}");
                    return Err(EXIT_USAGE);
                };
                out.network = Some(v.trim().to_string());
                i += 1;
            }
            "--rpc" if simulate => out.use_local_cli = Some(false),
            "--local" if simulate => out.use_local_cli = Some(true),
            "--yes" | "-y" if simulate => out.yes = true,
            flag if flag.starts_with("--") => {
                eprintln!("{app_name} {command}: unknown flag '{flag}'");
                eprintln!("Usage: {usage}");
                return Err(EXIT_USAGE);
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }
    let [contract_id, function_name] = positional.as_slice() else {
        eprintln!("Usage: {usage}");
        return Err(EXIT_USAGE);
    };
    out.contract_id = contract_id.trim().to_string();
    out.function_name = function_name.trim().to_string();
    if let Some(raw) = raw_args {
        out.args = parse_args_object(&raw).map_err(|e| {
            eprintln!("{app_name} {command}: {e}");
            EXIT_USAGE
        })?;
    }
    Ok(out)
}

fn single_positional(
    app_name: &str,
    command: &str,
    usage: &str,
    args: &[String],
) -> Result<(String, bool), i32> {
    let json_out = args.iter().any(|a| a == "--json");
    let rest: Vec<&String> = args.iter().filter(|a| a.as_str() != "--json").collect();
    match rest.as_slice() {
        [one] if !one.starts_with("--") => Ok((one.to_string(), json_out)),
        _ => {
            eprintln!("{app_name} {command}: invalid arguments");
            eprintln!("Usage: {usage}");
            Err(EXIT_USAGE)
        }
    }
}

pub fn report_lines(report: &ValidationReport) -> Vec<String> {
    let mut lines = vec![
        if report.valid { "Validation passed" } else { "Validation failed" }.to_string(),
    ];
    lines.extend(report.errors.iter().map(|e| format!("ERROR: {e}")));
    lines.extend(report.warning_lines().into_iter().map(|w| format!("WARN: {w}")));
    lines.extend(report.suggestions.iter().map(|s| format!("HINT: {s}")));
    lines
}

fn print_report(report: &ValidationReport) {
    for line in report_lines(report) {
        println!("{line}");
    }
}

fn print_schema(schema: &ContractFunctionSchema) {
    match &schema.description {
        Some(d) => println!("{}  {d}", schema.name),
        None => println!("{}", schema.name),
    }
    for p in &schema.parameters {
        let ty = p.type_hint.as_deref().unwrap_or("?");
        let req = if p.required { "required" } else { "optional" };
        match &p.description {
            Some(d) => println!("  --{} <{ty}> ({req})  {d}", p.name),
            None => println!("  --{} <{ty}> ({req})", p.name),
        }
    }
}

/// Loads schemas only for well-formed ids; a malformed id is reported by the
/// validator without shelling out.
fn load_schemas(ctx: &CmdCtx, contract_id: &str) -> Vec<ContractFunctionSchema> {
    if !is_valid_contract_id(contract_id) {
        return Vec::new();
    }
    ContractInspector::new(ctx.config, ctx.runner, ctx.log).load_schemas(contract_id)
}

/// Remembers a call that passed validation: the contract id in state, the
/// function name and each argument in history.
fn remember_call(ctx: &CmdCtx, contract_id: &str, function_name: &str, args: &Map<String, Value>) {
    if let Err(e) = remember_contract_id(contract_id) {
        ctx.log.warn("state.write_failed", e);
    }
    let mut history = match ctx.load_history() {
        Ok(h) => h,
        Err(e) => {
            ctx.log.warn("history.load_failed", e.to_string());
            return;
        }
    };
    let now = utc_now_millis();
    history.record(
        HistoryEntry {
            value: function_name.to_string(),
            contract_id: contract_id.to_string(),
            function_name: function_name.to_string(),
            parameter_name: None,
        },
        now,
    );
    for (name, value) in args {
        history.record(
            HistoryEntry {
                value: match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
                contract_id: contract_id.to_string(),
                function_name: function_name.to_string(),
                parameter_name: Some(name.clone()),
            },
            now,
        );
    }
    if let Err(e) = history.save() {
        ctx.log.warn("history.save_failed", e.to_string());
    }
}

pub fn cmd_functions(ctx: &CmdCtx, args: &[String]) -> i32 {
    let usage = format!("{} functions <contract-id> [--json]", ctx.app_name);
    let (contract_id, json_out) = match single_positional(ctx.app_name, "functions", &usage, args) {
        Ok(v) => v,
        Err(code) => return code,
    };
    if !ctx.require_valid_config("functions") {
        return EXIT_RUNTIME;
    }
    let inspector = ContractInspector::new(ctx.config, ctx.runner, ctx.log);
    let Some(parsed) = inspector.list_functions(&contract_id) else {
        eprintln!(
            "{}",
            format_error("Inspection", &format!("could not read help for {contract_id}"))
        );
        return EXIT_RUNTIME;
    };
    if !parsed.is_parsed() {
        eprintln!("WARN: no functions recognised in the CLI help output");
    }
    let functions: Vec<ContractFunctionSchema> = parsed
        .into_functions()
        .into_iter()
        .filter(|f| f.name != CLAP_HELP_COMMAND)
        .collect();
    if json_out {
        return if print_json("functions", &functions) { EXIT_OK } else { EXIT_RUNTIME };
    }
    for f in &functions {
        print_schema(f);
    }
    EXIT_OK
}

pub fn cmd_function(ctx: &CmdCtx, args: &[String]) -> i32 {
    let usage = format!("{} function <contract-id> <name> [--json]", ctx.app_name);
    let json_out = args.iter().any(|a| a == "--json");
    let rest: Vec<&String> = args.iter().filter(|a| a.as_str() != "--json").collect();
    let [contract_id, name] = rest.as_slice() else {
        eprintln!("{} function: invalid arguments", ctx.app_name);
        eprintln!("Usage: {usage}");
        return EXIT_USAGE;
    };
    if !ctx.require_valid_config("function") {
        return EXIT_RUNTIME;
    }
    let schema = ContractInspector::new(ctx.config, ctx.runner, ctx.log)
        .get_function_help(contract_id, name);
    if json_out {
        return if print_json("function", &schema) { EXIT_OK } else { EXIT_RUNTIME };
    }
    print_schema(&schema);
    EXIT_OK
}

pub fn cmd_validate(ctx: &CmdCtx, args: &[String]) -> i32 {
    let call = match parse_call_args(ctx.app_name, "validate", args) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let schemas = load_schemas(ctx, &call.contract_id);
    let matched = schemas.iter().find(|f| f.name == call.function_name);
    let report = validate(&call.contract_id, &call.function_name, &call.args, matched, &schemas);
    if report.valid {
        remember_call(ctx, &call.contract_id, &call.function_name, &call.args);
    }
    if call.json_out {
        print_json("validate", &report);
    } else {
        print_report(&report);
    }
    if report.valid { EXIT_OK } else { EXIT_VALIDATION }
}

fn print_simulation(result: &SimulationResult) {
    if result.success {
        println!("Simulation succeeded ({})", result.strategy);
        match &result.result {
            Some(Value::String(s)) => println!("result: {s}"),
            Some(v) => println!("result: {v}"),
            None => {}
        }
        return;
    }
    println!("Simulation failed ({})", result.strategy);
    if let Some(summary) = &result.error_summary {
        println!("ERROR: {summary}");
    }
    for s in &result.suggestions {
        println!("HINT: {s}");
    }
    if let Some(raw) = result.raw_output.as_ref().or(result.error.as_ref()) {
        println!();
        println!("{}", raw.trim_end());
    }
}

pub fn cmd_simulate(ctx: &CmdCtx, args: &[String]) -> i32 {
    let call = match parse_call_args(ctx.app_name, "simulate", args) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let mut config = ctx.config.clone();
    if let Some(local) = call.use_local_cli {
        config.use_local_cli = local;
    }
    let ctx = CmdCtx {
        config: &config,
        ..*ctx
    };
    if !ctx.require_valid_config("simulate") {
        return EXIT_RUNTIME;
    }

    let schemas = load_schemas(&ctx, &call.contract_id);
    let matched = schemas.iter().find(|f| f.name == call.function_name);
    let report = validate(&call.contract_id, &call.function_name, &call.args, matched, &schemas);
    if !report.valid {
        ctx.log.warn("simulate.blocked", report.errors.join("; "));
        if call.json_out {
            print_json("simulate", &json!({ "validation": report }));
        } else {
            print_report(&report);
        }
        return EXIT_VALIDATION;
    }
    remember_call(&ctx, &call.contract_id, &call.function_name, &call.args);
    if report.has_warnings() && !call.yes {
        if call.json_out {
            print_json("simulate", &json!({ "validation": report }));
        } else {
            print_report(&report);
            println!("Re-run with --yes to simulate despite these warnings.");
        }
        return EXIT_VALIDATION;
    }

    let strategy = select_strategy(&config, config.use_local_cli, ctx.runner, ctx.log);
    let contract_call = ContractCall {
        contract_id: call.contract_id,
        function_name: call.function_name,
        args: call.args,
        network: call.network,
    };
    let result = strategy.simulate(&contract_call);
    if call.json_out {
        print_json("simulate", &json!({ "validation": report, "simulation": result }));
    } else {
        if report.has_warnings() {
            print_report(&report);
        }
        print_simulation(&result);
    }
    if result.success { EXIT_OK } else { EXIT_RUNTIME }
}

pub fn cmd_build(ctx: &CmdCtx, args: &[String]) -> i32 {
    let usage = format!("{} build <contract-path> [--json]", ctx.app_name);
    let (path, json_out) = match single_positional(ctx.app_name, "build", &usage, args) {
        Ok(v) => v,
        Err(code) => return code,
    };
    if !ctx.require_valid_config("build") {
        return EXIT_RUNTIME;
    }
    let outcome = Deployer::new(ctx.config, ctx.runner, ctx.log).build_contract(&PathBuf::from(path));
    if json_out {
        print_json("build", &outcome);
    } else if outcome.success {
        println!("Build succeeded");
        match &outcome.wasm_path {
            Some(p) => println!("wasm: {}", p.display()),
            None => println!("WARN: could not locate the built WASM file"),
        }
    } else {
        eprintln!("Build failed");
        eprintln!("{}", outcome.output.trim_end());
    }
    if outcome.success { EXIT_OK } else { EXIT_RUNTIME }
}

pub fn print_deployment(result: &DeploymentResult) {
    if result.success {
        println!("Deployment succeeded");
        if let Some(id) = &result.contract_id {
            println!("contract_id: {id}");
        }
        if let Some(hash) = &result.transaction_hash {
            println!("transaction_hash: {hash}");
        }
        return;
    }
    eprintln!("Deployment failed");
    if let Some(e) = &result.error {
        eprintln!("ERROR: {}", e.trim_end());
    }
    if let Some(out) = &result.deploy_output {
        eprintln!();
        eprintln!("{}", out.trim_end());
    }
}

pub fn cmd_deploy(ctx: &CmdCtx, args: &[String]) -> i32 {
    let usage = format!(
        "{0} deploy <contract-path> [--json] | {0} deploy --wasm <file> [--json]",
        ctx.app_name
    );
    let json_out = args.iter().any(|a| a == "--json");
    let rest: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| *a != "--json")
        .collect();
    let (path, from_wasm) = match rest.as_slice() {
        ["--wasm", file] => (PathBuf::from(file), true),
        [path] if !path.starts_with("--") => (PathBuf::from(path), false),
        _ => {
            eprintln!("{} deploy: invalid arguments", ctx.app_name);
            eprintln!("Usage: {usage}");
            return EXIT_USAGE;
        }
    };
    if !ctx.require_valid_config("deploy") {
        return EXIT_RUNTIME;
    }
    let deployer = Deployer::new(ctx.config, ctx.runner, ctx.log);
    let result = if from_wasm {
        deployer.deploy_from_wasm(&path)
    } else {
        deployer.build_and_deploy(&path)
    };
    if let Some(id) = result.contract_id.as_deref().filter(|_| result.success)
        && let Err(e) = remember_contract_id(id)
    {
        ctx.log.warn("state.write_failed", e);
    }
    if json_out {
        print_json("deploy", &result);
    } else {
        print_deployment(&result);
    }
    if result.success { EXIT_OK } else { EXIT_RUNTIME }
}

struct SuggestArgs {
    contract_id: String,
    target: Option<(String, String)>,
    type_hint: Option<String>,
    input: String,
    json_out: bool,
}

fn parse_suggest_args(app_name: &str, args: &[String]) -> Result<SuggestArgs, i32> {
    let usage = format!(
        "{app_name} suggest <contract-id> [--function F --param P [--type T]] [--input PREFIX] [--json]"
    );
    let mut positional = Vec::new();
    let mut function = None;
    let mut param = None;
    let mut type_hint = None;
    let mut input = String::new();
    let mut json_out = false;
    let mut i = 0usize;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--json" {
            json_out = true;
            i += 1;
            continue;
        }
        if !flag.starts_with("--") {
            positional.push(args[i].clone());
            i += 1;
            continue;
        }
        let Some(value) = args.get(i + 1).cloned() else {
            eprintln!("Usage: {usage}");
            return Err(EXIT_USAGE);
        };
        match flag {
            "--function" => function = Some(value),
            "--param" => param = Some(value),
            "--type" => type_hint = Some(value),
            "--input" => input = value,
            other => {
                eprintln!("{app_name} suggest: unknown flag '{other}'");
                eprintln!("Usage: {usage}");
                return Err(EXIT_USAGE);
            }
        }
        i += 2;
    }
    let target = match (function, param) {
        (Some(f), Some(p)) => Some((f, p)),
        (None, None) if type_hint.is_none() => None,
        _ => {
            eprintln!("{app_name} suggest: --function and --param go together");
            eprintln!("Usage: {usage}");
            return Err(EXIT_USAGE);
        }
    };
    let [contract_id] = positional.as_slice() else {
        eprintln!("Usage: {usage}");
        return Err(EXIT_USAGE);
    };
    Ok(SuggestArgs {
        contract_id: contract_id.trim().to_string(),
        target,
        type_hint,
        input,
        json_out,
    })
}

pub fn cmd_suggest(ctx: &CmdCtx, args: &[String]) -> i32 {
    let parsed = match parse_suggest_args(ctx.app_name, args) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let history = match ctx.load_history() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("{}", format_error("Reading history", &e));
            return EXIT_RUNTIME;
        }
    };
    let default_id = last_contract_id().or_else(|| history.last_contract_id().map(ToOwned::to_owned));
    let mut engine = AutocompleteEngine::new(history);
    engine.set_last_contract_id(default_id);

    let can_inspect = is_valid_contract_id(&parsed.contract_id) && ctx.config.validate().is_empty();
    let inspector = ContractInspector::new(ctx.config, ctx.runner, ctx.log);
    let suggestion_ctx = match &parsed.target {
        None => {
            if can_inspect {
                engine.set_contract_functions(inspector.get_contract_functions(&parsed.contract_id));
            }
            SuggestionContext::for_function(&parsed.contract_id, &parsed.input)
        }
        Some((function, param)) => {
            let type_hint = parsed.type_hint.clone().or_else(|| {
                if !can_inspect {
                    return None;
                }
                inspector
                    .get_function_help(&parsed.contract_id, function)
                    .parameter(param)
                    .and_then(|p| p.type_hint.clone())
            });
            SuggestionContext::for_parameter(
                &parsed.contract_id,
                function,
                param,
                type_hint.as_deref(),
                &parsed.input,
            )
        }
    };
    let result = engine.get_suggestions(&suggestion_ctx, None);
    if parsed.json_out {
        return if print_json("suggest", &result) { EXIT_OK } else { EXIT_RUNTIME };
    }
    for s in &result.suggestions {
        let kind = s.kind.as_str();
        match &s.description {
            Some(d) => println!("{}\t{kind}\t{d}", s.value),
            None => println!("{}\t{kind}", s.value),
        }
    }
    EXIT_OK
}
