use std::time::Duration;

use serde_json::Value;

use super::{ExecutionStrategy, LOCAL_STRATEGY, success};
use crate::config::AppConfig;
use crate::error::ErrorKind;
use crate::paths::find_cli_path;
use crate::process::{ProcessRequest, ProcessRunner};
use crate::runlog::RunLog;
use crate::types::{ContractCall, SimulationResult};
use crate::util::summarize_failure;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Simulates through `contract invoke --send=no` on the configured CLI.
pub struct LocalCliStrategy<'a> {
    runner: &'a ProcessRunner,
    log: &'a RunLog,
    cli_path: String,
    source: String,
    network: String,
    timeout: Duration,
}

impl<'a> LocalCliStrategy<'a> {
    pub fn new(cfg: &AppConfig, runner: &'a ProcessRunner, log: &'a RunLog) -> Self {
        Self {
            runner,
            log,
            cli_path: cfg.cli_path.clone(),
            source: cfg.source.clone(),
            network: cfg.network.clone(),
            timeout: cfg.simulate_timeout(),
        }
    }

    /// `<cli> --version` exits cleanly.
    pub fn is_available(&self) -> bool {
        let req = ProcessRequest::new(&self.cli_path, vec!["--version".to_string()], VERSION_PROBE_TIMEOUT)
            .label("cli version");
        match self.runner.run(&req) {
            Ok(out) => {
                self.log.process_finished(&req, &out);
                out.success
            }
            Err(e) => {
                self.log.process_failed(&req, &e);
                false
            }
        }
    }

    fn unavailable(&self) -> SimulationResult {
        let found = find_cli_path().map(|p| p.display().to_string());
        let mut result = SimulationResult::failure(
            LOCAL_STRATEGY,
            ErrorKind::Execution,
            format!("Stellar CLI not found at \"{}\".", self.cli_path),
        );
        result.suggestions = cli_not_found_suggestions(found.as_deref());
        self.log.warn(
            "simulate.cli_missing",
            format!("{} unavailable; discovered: {}", self.cli_path, found.as_deref().unwrap_or("none")),
        );
        result
    }
}

/// Remediation for a missing CLI. A discovered binary is only ever suggested.
pub fn cli_not_found_suggestions(found: Option<&str>) -> Vec<String> {
    match found {
        Some(path) => vec![
            format!("Found Stellar CLI at: {path}"),
            format!("Point cli_path at it: stellar-preflight config set cli_path {path}"),
        ],
        None => vec![
            "Common locations: ~/.cargo/bin/stellar, /usr/local/bin/stellar".to_string(),
            "Install Stellar CLI: https://developers.stellar.org/docs/tools/cli".to_string(),
        ],
    }
}

/// Full argv after the program name. Strings pass through verbatim, other
/// JSON values are rendered compactly.
pub fn invoke_args(call: &ContractCall, source: &str, default_network: &str) -> Vec<String> {
    let network = call.network.as_deref().unwrap_or(default_network);
    let mut args: Vec<String> = [
        "contract",
        "invoke",
        "--id",
        call.contract_id.as_str(),
        "--source",
        source,
        "--network",
        network,
        "--send=no",
        "--",
        call.function_name.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for (name, value) in &call.args {
        args.push(format!("--{name}"));
        args.push(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    args
}

/// Last non-empty stdout line, as JSON when it parses.
pub fn parse_invoke_result(stdout: &str) -> Value {
    let Some(last) = stdout.lines().map(str::trim).rfind(|l| !l.is_empty()) else {
        return Value::Null;
    };
    serde_json::from_str(last).unwrap_or_else(|_| Value::String(last.to_string()))
}

impl ExecutionStrategy for LocalCliStrategy<'_> {
    fn name(&self) -> &'static str {
        LOCAL_STRATEGY
    }

    fn simulate(&self, call: &ContractCall) -> SimulationResult {
        if !self.is_available() {
            return self.unavailable();
        }
        let req = ProcessRequest::new(
            &self.cli_path,
            invoke_args(call, &self.source, &self.network),
            self.timeout,
        )
        .label(format!("simulate {}", call.function_name));
        let out = match self.runner.run(&req) {
            Ok(out) => out,
            Err(e) => {
                self.log.process_failed(&req, &e);
                return SimulationResult::failure(LOCAL_STRATEGY, ErrorKind::Execution, e.to_string());
            }
        };
        self.log.process_finished(&req, &out);
        let combined = out.combined();
        if !out.success {
            let mut result = SimulationResult::failure(LOCAL_STRATEGY, ErrorKind::Execution, combined.clone());
            result.error_summary = summarize_failure(&out.stderr).or(result.error_summary);
            result.raw_output = Some(combined);
            return result;
        }
        success(LOCAL_STRATEGY, parse_invoke_result(&out.stdout), Some(combined))
    }
}
