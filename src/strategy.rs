#[path = "strategy_local.rs"]
mod strategy_local;
#[path = "strategy_rpc.rs"]
mod strategy_rpc;

pub use strategy_local::{LocalCliStrategy, cli_not_found_suggestions, invoke_args, parse_invoke_result};
pub use strategy_rpc::{RpcError, RpcStrategy, simulate_request_body};

use serde_json::Value;

use crate::config::AppConfig;
use crate::process::ProcessRunner;
use crate::runlog::RunLog;
use crate::types::{ContractCall, SimulationResult};

pub const LOCAL_STRATEGY: &str = "local-cli";
pub const RPC_STRATEGY: &str = "rpc";

/// One way of running a validated call. Every implementation reports
/// through the same result shape, so callers only pick which one to use.
pub trait ExecutionStrategy {
    fn name(&self) -> &'static str;
    fn simulate(&self, call: &ContractCall) -> SimulationResult;
}

pub fn select_strategy<'a>(
    cfg: &AppConfig,
    use_local_cli: bool,
    runner: &'a ProcessRunner,
    log: &'a RunLog,
) -> Box<dyn ExecutionStrategy + 'a> {
    if use_local_cli {
        Box::new(LocalCliStrategy::new(cfg, runner, log))
    } else {
        Box::new(RpcStrategy::new(cfg, log))
    }
}

pub(crate) fn success(strategy: &str, result: Value, raw_output: Option<String>) -> SimulationResult {
    SimulationResult {
        success: true,
        strategy: strategy.to_string(),
        result: Some(result),
        raw_output,
        ..Default::default()
    }
}
