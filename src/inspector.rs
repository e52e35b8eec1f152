use std::time::Duration;

use serde_json::json;

use crate::config::AppConfig;
use crate::execmeta::output_preview;
use crate::help_parser::{ClapHelpParser, HelpParse, HelpParser};
use crate::process::{ProcessRequest, ProcessRunner};
use crate::runlog::{Level, LogEvent, RunLog};
use crate::types::ContractFunctionSchema;

/// clap lists its own `help` subcommand next to the contract's functions.
pub(crate) const CLAP_HELP_COMMAND: &str = "help";

/// Anything that can produce the function schemas of a deployed contract.
pub trait SchemaSource {
    fn load_schemas(&self, contract_id: &str) -> Vec<ContractFunctionSchema>;
}

/// Discovers function schemas by asking the CLI for a contract's help text.
///
/// Failures never propagate: a CLI error degrades to an empty list (or a
/// schema without parameters) and a warning in the run log.
pub struct ContractInspector<'a> {
    runner: &'a ProcessRunner,
    log: &'a RunLog,
    cli_path: String,
    source: String,
    network: String,
    timeout: Duration,
    parser: Box<dyn HelpParser>,
}

impl<'a> ContractInspector<'a> {
    pub fn new(cfg: &AppConfig, runner: &'a ProcessRunner, log: &'a RunLog) -> Self {
        Self {
            runner,
            log,
            cli_path: cfg.cli_path.clone(),
            source: cfg.source.clone(),
            network: cfg.network.clone(),
            timeout: cfg.inspect_timeout(),
            parser: Box::new(ClapHelpParser),
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn HelpParser>) -> Self {
        self.parser = parser;
        self
    }

    fn help_request(&self, contract_id: &str, function_name: Option<&str>) -> ProcessRequest {
        let mut args: Vec<String> = [
            "contract",
            "invoke",
            "--id",
            contract_id,
            "--source",
            self.source.as_str(),
            "--network",
            self.network.as_str(),
            "--",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(name) = function_name {
            args.push(name.to_string());
        }
        args.push("--help".to_string());
        let label = match function_name {
            Some(name) => format!("inspect {name}"),
            None => "inspect".to_string(),
        };
        ProcessRequest::new(&self.cli_path, args, self.timeout).label(label)
    }

    fn run_help(&self, req: &ProcessRequest) -> Option<String> {
        match self.runner.run(req) {
            Ok(out) => {
                self.log.process_finished(req, &out);
                if out.success {
                    Some(out.combined())
                } else {
                    self.log.warn(
                        "inspect.failed",
                        format!("{} exited with {:?}", req.label, out.exit_code),
                    );
                    None
                }
            }
            Err(e) => {
                self.log.process_failed(req, &e);
                None
            }
        }
    }

    /// Top-level help, parsed. `Unparsed` when the CLI answered with text the
    /// grammar does not recognise.
    pub fn list_functions(&self, contract_id: &str) -> Option<HelpParse> {
        let req = self.help_request(contract_id, None);
        let text = self.run_help(&req)?;
        let parsed = self.parser.parse_functions(&text);
        if let HelpParse::Unparsed { raw } = &parsed {
            self.log.record(
                LogEvent::new("inspect.unparsed", Level::Warn, "no functions recognised in help output")
                    .data(json!({ "contract_id": contract_id, "preview": output_preview(raw, 180) })),
            );
        }
        Some(parsed)
    }

    /// The contract's own functions; clap's `help` entry is dropped.
    pub fn get_contract_functions(&self, contract_id: &str) -> Vec<ContractFunctionSchema> {
        self.list_functions(contract_id)
            .map(HelpParse::into_functions)
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f.name != CLAP_HELP_COMMAND)
            .collect()
    }

    pub fn get_function_help(&self, contract_id: &str, function_name: &str) -> ContractFunctionSchema {
        let req = self.help_request(contract_id, Some(function_name));
        match self.run_help(&req) {
            Some(text) => self.parser.parse_function_help(function_name, &text),
            None => ContractFunctionSchema::bare(function_name),
        }
    }
}

impl SchemaSource for ContractInspector<'_> {
    /// Function list plus per-function parameters, in help-text order.
    fn load_schemas(&self, contract_id: &str) -> Vec<ContractFunctionSchema> {
        self.get_contract_functions(contract_id)
            .into_iter()
            .map(|listed| {
                let detailed = self.get_function_help(contract_id, &listed.name);
                ContractFunctionSchema {
                    description: listed.description.or(detailed.description),
                    parameters: detailed.parameters,
                    name: listed.name,
                }
            })
            .collect()
    }
}
