use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::paths::toolchain_dirs;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeoutInfo {
    pub label: String,
    pub timeout_secs: u64,
}

#[derive(Debug)]
pub enum ProcessError {
    Timeout(TimeoutInfo),
    Spawn {
        label: String,
        source: io::Error,
    },
    Message(String),
}

impl ProcessError {
    pub fn timeout_info(&self) -> Option<&TimeoutInfo> {
        match self {
            Self::Timeout(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(info) => {
                write!(f, "{} timed out after {}s", info.label, info.timeout_secs)
            }
            Self::Spawn { label, source } => write!(f, "{label} spawn failed: {source}"),
            Self::Message(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One external-tool invocation.
#[derive(Clone, Debug)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
    pub label: String,
}

impl ProcessRequest {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        let program = program.into();
        let label = match args.first() {
            Some(first) => format!("{program} {first}"),
            None => program.clone(),
        };
        Self {
            program,
            args,
            cwd: None,
            timeout,
            label,
        }
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// The argv as a copy-pasteable shell line.
    pub fn command_line(&self) -> String {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.as_str());
        argv.extend(self.args.iter().map(String::as_str));
        shell_words::join(argv)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
    pub duration_ms: u64,
}

impl ProcessOutput {
    /// stdout followed by stderr, the only signal the upstream tool offers.
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        if !self.stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&self.stderr);
        }
        combined
    }
}

/// Runs external executables with an augmented search path, a hard timeout,
/// and a per-stream output cap.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    search_path: OsString,
    max_output_bytes: usize,
}

impl ProcessRunner {
    pub fn new(max_output_bytes: usize) -> Self {
        Self {
            search_path: augmented_search_path(),
            max_output_bytes: max_output_bytes.max(1),
        }
    }

    pub fn with_search_path(search_path: OsString, max_output_bytes: usize) -> Self {
        Self {
            search_path,
            max_output_bytes: max_output_bytes.max(1),
        }
    }

    pub fn search_path(&self) -> &OsString {
        &self.search_path
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }

    pub fn run(&self, req: &ProcessRequest) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Command::new(&req.program);
        cmd.args(&req.args)
            .env("PATH", &self.search_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &req.cwd {
            cmd.current_dir(dir);
        }
        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| ProcessError::Spawn {
            label: req.label.clone(),
            source: e,
        })?;
        let stdout_reader = spawn_capped_reader(child.stdout.take(), self.max_output_bytes);
        let stderr_reader = spawn_capped_reader(child.stderr.take(), self.max_output_bytes);
        let status = wait_child_status(&mut child, req)?;
        let (stdout, stdout_cut) = join_reader(stdout_reader, &req.label)?;
        let (stderr, stderr_cut) = join_reader(stderr_reader, &req.label)?;
        Ok(ProcessOutput {
            exit_code: status.code(),
            success: status.success(),
            stdout,
            stderr,
            truncated: stdout_cut || stderr_cut,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Toolchain install directories, in priority order, ahead of the inherited PATH.
pub fn augmented_search_path() -> OsString {
    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let mut dirs: Vec<PathBuf> = toolchain_dirs();
    dirs.extend(std::env::split_paths(&inherited));
    std::env::join_paths(dirs).unwrap_or(inherited)
}

type ReaderHandle = Option<JoinHandle<io::Result<(Vec<u8>, bool)>>>;

fn spawn_capped_reader<R: Read + Send + 'static>(stream: Option<R>, cap: usize) -> ReaderHandle {
    let stream = stream?;
    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        let mut limited = stream.take(cap as u64);
        limited.read_to_end(&mut buf)?;
        // Keep draining so the child never blocks on a full pipe.
        let mut rest = limited.into_inner();
        let dropped = io::copy(&mut rest, &mut io::sink())?;
        Ok((buf, dropped > 0))
    }))
}

fn join_reader(handle: ReaderHandle, label: &str) -> Result<(String, bool), ProcessError> {
    let Some(handle) = handle else {
        return Ok((String::new(), false));
    };
    match handle.join() {
        Ok(Ok((bytes, truncated))) => Ok((String::from_utf8_lossy(&bytes).to_string(), truncated)),
        Ok(Err(e)) => Err(ProcessError::Message(format!(
            "{label} read output failed: {e}"
        ))),
        Err(_) => Err(ProcessError::Message(format!(
            "{label} output reader panicked"
        ))),
    }
}

fn wait_child_status(child: &mut Child, req: &ProcessRequest) -> Result<ExitStatus, ProcessError> {
    match child
        .wait_timeout(req.timeout)
        .map_err(|e| ProcessError::Message(format!("{} wait timeout error: {e}", req.label)))?
    {
        Some(status) => Ok(status),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(ProcessError::Timeout(TimeoutInfo {
                label: req.label.clone(),
                timeout_secs: req.timeout.as_secs().max(1),
            }))
        }
    }
}
