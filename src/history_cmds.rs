use crate::cmdctx::CmdCtx;
use crate::error::{EXIT_OK, EXIT_RUNTIME, EXIT_USAGE, format_error};
use crate::execmeta::iso_from_millis;
use crate::history::HistoryStore;
use crate::types::HistoryRecord;
use crate::util::print_json;

fn print_usage(app_name: &str) -> i32 {
    eprintln!("Usage: {app_name} history <show [contract-id] [--json]|clear>");
    EXIT_USAGE
}

fn render_record(r: &HistoryRecord) -> String {
    let target = match &r.parameter_name {
        Some(p) => format!("{}.{p}", r.function_name),
        None => r.function_name.clone(),
    };
    format!("{}  {}  {target} = {}", iso_from_millis(r.timestamp), r.contract_id, r.value)
}

pub fn cmd_history(ctx: &CmdCtx, args: &[String]) -> i32 {
    let sub = args.first().map(String::as_str).unwrap_or("show");
    match sub {
        "show" => {
            let json_out = args.iter().any(|a| a == "--json");
            let filter: Vec<&str> = args
                .iter()
                .skip(1)
                .map(String::as_str)
                .filter(|a| *a != "--json")
                .collect();
            if filter.len() > 1 {
                return print_usage(ctx.app_name);
            }
            let history = match ctx.load_history() {
                Ok(h) => h,
                Err(e) => {
                    eprintln!("{}", format_error("Reading history", &e));
                    return EXIT_RUNTIME;
                }
            };
            let records: Vec<&HistoryRecord> = history
                .records()
                .iter()
                .rev()
                .filter(|r| filter.first().is_none_or(|id| r.contract_id == *id))
                .collect();
            if json_out {
                return if print_json("history", &records) { EXIT_OK } else { EXIT_RUNTIME };
            }
            if records.is_empty() {
                println!("history is empty");
            }
            for r in records {
                println!("{}", render_record(r));
            }
            EXIT_OK
        }
        "clear" => {
            if args.len() > 1 {
                return print_usage(ctx.app_name);
            }
            let Some(path) = ctx.history_file() else {
                eprintln!("{} history clear: unable to resolve history file", ctx.app_name);
                return EXIT_RUNTIME;
            };
            let mut history = match HistoryStore::load(&path, ctx.config.history_limit) {
                Ok(h) => h,
                Err(e) => {
                    ctx.log.warn("history.load_failed", e.to_string());
                    HistoryStore::at(&path, ctx.config.history_limit)
                }
            };
            history.clear();
            if let Err(e) = history.save() {
                eprintln!("{}", format_error("Clearing history", &e));
                return EXIT_RUNTIME;
            }
            ctx.log.info("history.cleared", path.display().to_string());
            println!("ok");
            EXIT_OK
        }
        _ => print_usage(ctx.app_name),
    }
}
