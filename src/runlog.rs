use serde::Serialize;
use serde_json::Value;
use std::cell::Cell;
use std::path::{Path, PathBuf};

use crate::execmeta::{make_event_id, output_preview, utc_now_iso};
use crate::logs::append_jsonl;
use crate::process::{ProcessError, ProcessOutput, ProcessRequest};
use crate::util::sha256_hex;

const PREVIEW_CHARS: usize = 180;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Serialize)]
pub struct LogEvent {
    pub event_id: String,
    pub timestamp: String,
    pub event: String,
    pub level: Level,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl LogEvent {
    pub fn new(event: &str, level: Level, message: impl Into<String>) -> Self {
        Self {
            event_id: make_event_id(event),
            timestamp: utc_now_iso(),
            event: event.to_string(),
            level,
            message: message.into(),
            command: None,
            duration_ms: None,
            exit_code: None,
            timed_out: None,
            output_sha256: None,
            output_preview: None,
            data: None,
        }
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Explicit logging context: created once at startup, passed by reference,
/// closed at shutdown.
#[derive(Debug)]
pub struct RunLog {
    path: Option<PathBuf>,
    echo_stderr: bool,
    written: Cell<usize>,
    failed: Cell<usize>,
}

impl RunLog {
    pub fn open(path: Option<PathBuf>, echo_stderr: bool) -> Self {
        let log = Self {
            path,
            echo_stderr,
            written: Cell::new(0),
            failed: Cell::new(0),
        };
        log.info("session.opened", "run log opened");
        log
    }

    /// A context that records nothing to disk.
    pub fn disabled() -> Self {
        Self {
            path: None,
            echo_stderr: false,
            written: Cell::new(0),
            failed: Cell::new(0),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn events_written(&self) -> usize {
        self.written.get()
    }

    pub fn record(&self, event: LogEvent) {
        if self.echo_stderr && event.level != Level::Info {
            eprintln!("[{}] {}: {}", event.event, level_label(event.level), event.message);
        }
        let Some(path) = &self.path else {
            return;
        };
        let outcome = serde_json::to_value(&event)
            .map_err(|e| e.to_string())
            .and_then(|v| append_jsonl(path, &v));
        match outcome {
            Ok(()) => self.written.set(self.written.get() + 1),
            Err(e) => {
                // Logging never fails the caller; only the first failure is reported.
                if self.failed.get() == 0 {
                    eprintln!("stellar-preflight: run log unavailable: {e}");
                }
                self.failed.set(self.failed.get() + 1);
            }
        }
    }

    pub fn info(&self, event: &str, message: impl Into<String>) {
        self.record(LogEvent::new(event, Level::Info, message));
    }

    pub fn warn(&self, event: &str, message: impl Into<String>) {
        self.record(LogEvent::new(event, Level::Warn, message));
    }

    pub fn error(&self, event: &str, message: impl Into<String>) {
        self.record(LogEvent::new(event, Level::Error, message));
    }

    pub fn process_finished(&self, req: &ProcessRequest, out: &ProcessOutput) {
        let combined = out.combined();
        let level = if out.success { Level::Info } else { Level::Warn };
        let mut ev = LogEvent::new(
            "process.finished",
            level,
            format!("{} exited with {:?}", req.label, out.exit_code),
        );
        ev.command = Some(req.command_line());
        ev.duration_ms = Some(out.duration_ms);
        ev.exit_code = out.exit_code;
        ev.timed_out = Some(false);
        ev.output_sha256 = Some(sha256_hex(&combined));
        ev.output_preview = Some(output_preview(&combined, PREVIEW_CHARS));
        if out.truncated {
            ev.data = Some(serde_json::json!({ "truncated": true }));
        }
        self.record(ev);
    }

    pub fn process_failed(&self, req: &ProcessRequest, err: &ProcessError) {
        let mut ev = LogEvent::new("process.failed", Level::Error, err.to_string());
        ev.command = Some(req.command_line());
        ev.timed_out = Some(err.timeout_info().is_some());
        self.record(ev);
    }

    pub fn close(self) {
        let written = self.written.get();
        let failed = self.failed.get();
        self.record(
            LogEvent::new("session.closed", Level::Info, "run log closed").data(
                serde_json::json!({ "events_written": written, "events_failed": failed }),
            ),
        );
    }
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::Info => "info",
        Level::Warn => "warn",
        Level::Error => "error",
    }
}
