use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::PreflightResult;
use crate::history::HistoryStore;
use crate::paths::resolve_history_file;
use crate::process::ProcessRunner;
use crate::runlog::RunLog;

/// Everything a command handler needs, borrowed from `app::run`.
pub struct CmdCtx<'a> {
    pub app_name: &'static str,
    pub app_version: &'static str,
    pub config: &'a AppConfig,
    pub runner: &'a ProcessRunner,
    pub log: &'a RunLog,
}

impl CmdCtx<'_> {
    pub fn history_file(&self) -> Option<PathBuf> {
        resolve_history_file()
    }

    /// Persisted history, or an unsaved in-memory store when no state
    /// directory can be resolved.
    pub fn load_history(&self) -> PreflightResult<HistoryStore> {
        match self.history_file() {
            Some(path) => HistoryStore::load(&path, self.config.history_limit),
            None => Ok(HistoryStore::in_memory(self.config.history_limit)),
        }
    }

    /// Refuses execution commands when the configuration cannot work.
    pub fn require_valid_config(&self, command: &str) -> bool {
        let problems = self.config.validate();
        if problems.is_empty() {
            return true;
        }
        eprintln!("{} {command}: CLI configuration is invalid", self.app_name);
        for p in &problems {
            eprintln!("  - {p}");
        }
        self.log.error("config.invalid", problems.join("; "));
        false
    }
}
