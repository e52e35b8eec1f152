use serde_json::{Value, json};

use crate::cmdctx::CmdCtx;
use crate::config::PREFERENCE_KEYS;
use crate::error::{EXIT_OK, EXIT_RUNTIME, EXIT_USAGE};
use crate::paths::resolve_state_file;
use crate::state::{parse_cli_value, set_state_path};
use crate::util::print_json;

fn print_usage(app_name: &str) -> i32 {
    eprintln!("Usage: {app_name} config <show|set <key> <value>|unset <key>>");
    eprintln!("Keys: {}", PREFERENCE_KEYS.join(", "));
    EXIT_USAGE
}

/// Checks a key and its value before anything is written.
pub fn preference_value(key: &str, raw: &str) -> Result<Value, String> {
    if !PREFERENCE_KEYS.contains(&key) {
        return Err(format!("unknown key '{key}'"));
    }
    let value = parse_cli_value(raw.trim());
    if key == "use_local_cli" {
        return match value {
            Value::Bool(_) => Ok(value),
            _ => Err("use_local_cli must be true or false".to_string()),
        };
    }
    match value {
        Value::String(s) if s.is_empty() => Err(format!("{key} must not be empty")),
        Value::String(s) => Ok(Value::String(s)),
        // every other key is text, even when it parses as a number
        _ => Ok(Value::String(raw.trim().to_string())),
    }
}

fn cmd_config_show(ctx: &CmdCtx) -> i32 {
    let state_file = resolve_state_file()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unresolved>".to_string());
    let view = json!({
        "state_file": state_file,
        "effective": ctx.config,
        "problems": ctx.config.validate(),
    });
    if print_json("config show", &view) { EXIT_OK } else { EXIT_RUNTIME }
}

fn write_preference(ctx: &CmdCtx, command: &str, key: &str, value: Value) -> i32 {
    if let Err(e) = set_state_path(&format!("preferences.{key}"), value) {
        eprintln!("{} config {command}: {e}", ctx.app_name);
        return EXIT_RUNTIME;
    }
    ctx.log.info("config.updated", format!("{command} {key}"));
    println!("ok");
    EXIT_OK
}

pub fn cmd_config(ctx: &CmdCtx, args: &[String]) -> i32 {
    let sub = args.first().map(String::as_str).unwrap_or("show");
    match (sub, &args[args.len().min(1)..]) {
        ("show", []) => cmd_config_show(ctx),
        ("set", [key, raw]) => match preference_value(key, raw) {
            Ok(value) => write_preference(ctx, "set", key, value),
            Err(e) => {
                eprintln!("{} config set: {e}", ctx.app_name);
                print_usage(ctx.app_name)
            }
        },
        ("unset", [key]) => {
            if !PREFERENCE_KEYS.contains(&key.as_str()) {
                eprintln!("{} config unset: unknown key '{key}'", ctx.app_name);
                return print_usage(ctx.app_name);
            }
            write_preference(ctx, "unset", key, Value::Null)
        }
        _ => print_usage(ctx.app_name),
    }
}
