use serde::Serialize;
use serde_json::Value;
use std::env;
use std::time::Duration;

use crate::state::value_at_path;

pub const APP_NAME: &str = "stellar-preflight";
pub const APP_DESC: &str = "Inspect, validate, simulate and deploy Soroban contracts through the Stellar CLI";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_CLI_PATH: &str = "stellar";
pub const DEFAULT_SOURCE: &str = "dev";
pub const DEFAULT_NETWORK: &str = "testnet";
pub const DEFAULT_RPC_URL: &str = "https://soroban-testnet.stellar.org:443";
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_INSPECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SIMULATE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Keys `config set` accepts, stored under `preferences.` in the state file.
pub const PREFERENCE_KEYS: [&str; 5] = ["cli_path", "source", "network", "rpc_url", "use_local_cli"];

/// Process-level configuration snapshot.
///
/// Built once at startup from the environment layered over persisted
/// preferences, then handed to commands by reference.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub cli_path: String,
    pub source: String,
    pub network: String,
    pub rpc_url: String,
    pub use_local_cli: bool,
    pub build_timeout_secs: u64,
    pub deploy_timeout_secs: u64,
    pub inspect_timeout_secs: u64,
    pub simulate_timeout_secs: u64,
    pub max_output_bytes: usize,
    pub history_limit: usize,
    pub log_enabled: bool,
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cli_path: DEFAULT_CLI_PATH.to_string(),
            source: DEFAULT_SOURCE.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            use_local_cli: true,
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            deploy_timeout_secs: DEFAULT_DEPLOY_TIMEOUT_SECS,
            inspect_timeout_secs: DEFAULT_INSPECT_TIMEOUT_SECS,
            simulate_timeout_secs: DEFAULT_SIMULATE_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            history_limit: DEFAULT_HISTORY_LIMIT,
            log_enabled: true,
            verbose: false,
        }
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v == 1)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .max(1)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
        .max(1)
}

fn state_pref_str(state: Option<&Value>, key: &str) -> Option<String> {
    state
        .and_then(|v| value_at_path(v, &format!("preferences.{key}")))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn state_pref_bool(state: Option<&Value>, key: &str) -> Option<bool> {
    state
        .and_then(|v| value_at_path(v, &format!("preferences.{key}")))
        .and_then(Value::as_bool)
}

impl AppConfig {
    pub fn from_env_and_state(state: Option<&Value>) -> Self {
        let defaults = Self::default();
        Self {
            cli_path: env_str("SPF_CLI_PATH")
                .or_else(|| state_pref_str(state, "cli_path"))
                .unwrap_or(defaults.cli_path),
            source: env_str("SPF_SOURCE")
                .or_else(|| state_pref_str(state, "source"))
                .unwrap_or(defaults.source),
            network: env_str("SPF_NETWORK")
                .or_else(|| state_pref_str(state, "network"))
                .unwrap_or(defaults.network),
            rpc_url: env_str("SPF_RPC_URL")
                .or_else(|| state_pref_str(state, "rpc_url"))
                .unwrap_or(defaults.rpc_url),
            use_local_cli: env_bool("SPF_USE_LOCAL_CLI")
                .or_else(|| state_pref_bool(state, "use_local_cli"))
                .unwrap_or(defaults.use_local_cli),
            build_timeout_secs: env_u64("SPF_TIMEOUT_BUILD_SECS", DEFAULT_BUILD_TIMEOUT_SECS),
            deploy_timeout_secs: env_u64("SPF_TIMEOUT_DEPLOY_SECS", DEFAULT_DEPLOY_TIMEOUT_SECS),
            inspect_timeout_secs: env_u64(
                "SPF_TIMEOUT_INSPECT_SECS",
                DEFAULT_INSPECT_TIMEOUT_SECS,
            ),
            simulate_timeout_secs: env_u64(
                "SPF_TIMEOUT_SIMULATE_SECS",
                DEFAULT_SIMULATE_TIMEOUT_SECS,
            ),
            max_output_bytes: env_usize("SPF_MAX_OUTPUT_BYTES", DEFAULT_MAX_OUTPUT_BYTES),
            history_limit: env_usize("SPF_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
            log_enabled: env_bool("SPF_LOG").unwrap_or(defaults.log_enabled),
            verbose: env_bool("SPF_VERBOSE").unwrap_or(defaults.verbose),
        }
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_secs)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_secs)
    }

    pub fn simulate_timeout(&self) -> Duration {
        Duration::from_secs(self.simulate_timeout_secs)
    }

    /// Problems that make execution commands refuse to run.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.use_local_cli && self.cli_path.trim().is_empty() {
            errors.push("cli_path must not be empty when using the local CLI.".to_string());
        }
        if self.source.trim().is_empty() {
            errors.push("source identity must not be empty.".to_string());
        }
        if self.network.trim().is_empty() {
            errors.push("network must not be empty.".to_string());
        }
        if !self.use_local_cli
            && !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://"))
        {
            errors.push(format!(
                "rpc_url must be an http(s) URL when using RPC, got '{}'.",
                self.rpc_url
            ));
        }
        errors
    }
}
