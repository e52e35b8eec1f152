use std::path::Path;
use std::time::Duration;

use serde_json::json;

use crate::config::AppConfig;
use crate::deploy_output::{parse_build_output, to_deployment_result};
use crate::error::ErrorKind;
use crate::process::{ProcessOutput, ProcessRequest, ProcessRunner};
use crate::runlog::{Level, LogEvent, RunLog};
use crate::types::{BuildOutcome, DeploymentResult};

pub const WASM_NOT_LOCATED: &str = "Build succeeded but could not locate WASM file";

/// Drives `contract build` and `contract deploy` through the CLI.
///
/// Builds of the same contract path are not serialised; two overlapping
/// calls share one `target/` directory.
pub struct Deployer<'a> {
    runner: &'a ProcessRunner,
    log: &'a RunLog,
    cli_path: String,
    source: String,
    network: String,
    build_timeout: Duration,
    deploy_timeout: Duration,
}

impl<'a> Deployer<'a> {
    pub fn new(cfg: &AppConfig, runner: &'a ProcessRunner, log: &'a RunLog) -> Self {
        Self {
            runner,
            log,
            cli_path: cfg.cli_path.clone(),
            source: cfg.source.clone(),
            network: cfg.network.clone(),
            build_timeout: cfg.build_timeout(),
            deploy_timeout: cfg.deploy_timeout(),
        }
    }

    fn run(&self, req: &ProcessRequest) -> Result<ProcessOutput, String> {
        match self.runner.run(req) {
            Ok(out) => {
                self.log.process_finished(req, &out);
                Ok(out)
            }
            Err(e) => {
                self.log.process_failed(req, &e);
                Err(e.to_string())
            }
        }
    }

    pub fn build_contract(&self, contract_path: &Path) -> BuildOutcome {
        let req = ProcessRequest::new(
            &self.cli_path,
            vec!["contract".to_string(), "build".to_string()],
            self.build_timeout,
        )
        .current_dir(contract_path)
        .label("contract build");
        let out = match self.run(&req) {
            Ok(out) => out,
            Err(e) => {
                return BuildOutcome {
                    success: false,
                    output: e,
                    ..Default::default()
                };
            }
        };
        let output = out.combined();
        if !out.success {
            return BuildOutcome {
                success: false,
                output,
                ..Default::default()
            };
        }
        let artifact = parse_build_output(&output, contract_path);
        BuildOutcome {
            success: true,
            output,
            wasm_path: artifact.wasm_path,
            artifact_source: artifact.source,
        }
    }

    pub fn deploy_contract(&self, wasm_path: &Path) -> DeploymentResult {
        if !wasm_path.is_file() {
            return DeploymentResult::failure(
                ErrorKind::Validation,
                format!("WASM file not found: {}", wasm_path.display()),
            );
        }
        let req = ProcessRequest::new(
            &self.cli_path,
            vec![
                "contract".to_string(),
                "deploy".to_string(),
                "--wasm".to_string(),
                wasm_path.to_string_lossy().to_string(),
                "--source".to_string(),
                self.source.clone(),
                "--network".to_string(),
                self.network.clone(),
            ],
            self.deploy_timeout,
        )
        .label("contract deploy");
        let out = match self.run(&req) {
            Ok(out) => out,
            Err(e) => return DeploymentResult::failure(ErrorKind::Execution, e),
        };
        let output = out.combined();
        if !out.success {
            let error = if out.stderr.trim().is_empty() {
                output.clone()
            } else {
                out.stderr.clone()
            };
            return DeploymentResult {
                deploy_output: Some(output),
                ..DeploymentResult::failure(ErrorKind::Execution, error)
            };
        }
        let result = to_deployment_result(&output);
        if let Some(id) = &result.contract_id {
            self.log.record(
                LogEvent::new("deploy.succeeded", Level::Info, format!("deployed {id}")).data(
                    json!({ "contract_id": id, "transaction_hash": result.transaction_hash }),
                ),
            );
        }
        result
    }

    /// Build, then deploy the artifact the build located. A failed build or a
    /// missing artifact never reaches the deploy step.
    pub fn build_and_deploy(&self, contract_path: &Path) -> DeploymentResult {
        let build = self.build_contract(contract_path);
        if !build.success {
            return DeploymentResult {
                build_output: Some(build.output.clone()),
                ..DeploymentResult::failure(
                    ErrorKind::Execution,
                    format!("Build failed: {}", build.output),
                )
            };
        }
        let Some(wasm_path) = build.wasm_path else {
            return DeploymentResult {
                build_output: Some(build.output),
                ..DeploymentResult::failure(ErrorKind::ParseAmbiguity, WASM_NOT_LOCATED)
            };
        };
        if let Some(source) = build.artifact_source {
            self.log.record(
                LogEvent::new("build.artifact", Level::Info, wasm_path.display().to_string())
                    .data(json!({ "source": source })),
            );
        }
        let mut result = self.deploy_contract(&wasm_path);
        result.build_output = Some(build.output);
        result
    }

    pub fn deploy_from_wasm(&self, wasm_path: &Path) -> DeploymentResult {
        self.deploy_contract(wasm_path)
    }
}
