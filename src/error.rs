use std::fmt;
use std::path::PathBuf;

pub const EXIT_OK: i32 = 0;
pub const EXIT_RUNTIME: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_VALIDATION: i32 = 3;

pub type PreflightResult<T> = Result<T, PreflightError>;

#[derive(Debug)]
pub enum PreflightError {
    Io {
        context: String,
        source: std::io::Error,
    },
    JsonParse {
        context: String,
        source: serde_json::Error,
    },
    JsonFile {
        file: PathBuf,
        content_preview: String,
        source: serde_json::Error,
    },
    InvalidData {
        context: String,
    },
}

impl PreflightError {
    pub fn invalid(context: impl Into<String>) -> Self {
        PreflightError::InvalidData {
            context: context.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PreflightError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        PreflightError::JsonParse {
            context: context.into(),
            source,
        }
    }
}

impl fmt::Display for PreflightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreflightError::Io { context, source } => write!(f, "{context}: {source}"),
            PreflightError::JsonParse { context, source } => write!(f, "{context}: {source}"),
            PreflightError::JsonFile {
                file,
                content_preview,
                source,
            } => write!(
                f,
                "failed to parse json in {} (preview='{}'): {}",
                file.display(),
                content_preview,
                source
            ),
            PreflightError::InvalidData { context } => write!(f, "{context}"),
        }
    }
}

impl std::error::Error for PreflightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PreflightError::Io { source, .. } => Some(source),
            PreflightError::JsonParse { source, .. } => Some(source),
            PreflightError::JsonFile { source, .. } => Some(source),
            PreflightError::InvalidData { .. } => None,
        }
    }
}

/// The three outcome classes a failed operation is reported as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Pre-execution and recoverable; carries remediation suggestions.
    Validation,
    /// Subprocess or network failure; raw diagnostics attached, safe to retry.
    Execution,
    /// Extraction found nothing usable; functionality degrades instead of failing.
    ParseAmbiguity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Execution => "execution",
            ErrorKind::ParseAmbiguity => "parse_ambiguity",
        };
        f.write_str(s)
    }
}

/// Formats any failure surfaced at the command boundary into one line.
pub fn format_error(context: &str, err: &dyn fmt::Display) -> String {
    let msg = err.to_string();
    let first = msg.lines().find(|l| !l.trim().is_empty()).unwrap_or("unknown error");
    format!("{context} failed: {}", first.trim())
}

pub fn print_usage_error(command: &str, usage: &str) -> i32 {
    eprintln!("stellar-preflight {command}: invalid arguments");
    eprintln!("Usage: {usage}");
    EXIT_USAGE
}
