use crate::error::{PreflightError, PreflightResult};
use crate::paths::ensure_parent_dir;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

pub fn append_jsonl(path: &Path, value: &Value) -> Result<(), String> {
    append_jsonl_locked(path, value).map_err(|e| e.to_string())
}

fn append_jsonl_locked(path: &Path, value: &Value) -> PreflightResult<()> {
    ensure_parent_dir(path).map_err(PreflightError::invalid)?;
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PreflightError::io(format!("failed opening {}", path.display()), e))?;
    f.lock_exclusive()
        .map_err(|e| PreflightError::io(format!("failed locking {}", path.display()), e))?;
    let mut line =
        serde_json::to_string(value).map_err(|e| PreflightError::json("log json serialize", e))?;
    line.push('\n');
    let write_res = f
        .write_all(line.as_bytes())
        .map_err(|e| PreflightError::io(format!("failed writing {}", path.display()), e));
    let _ = f.unlock();
    write_res
}

/// Reads every parseable row; malformed lines are skipped.
pub fn read_jsonl(path: &Path) -> PreflightResult<Vec<Value>> {
    let file = File::open(path)
        .map_err(|e| PreflightError::io(format!("cannot open {}", path.display()), e))?;
    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line =
            line.map_err(|e| PreflightError::io(format!("cannot read {}", path.display()), e))?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(v) = serde_json::from_str::<Value>(&line) {
            rows.push(v);
        }
    }
    Ok(rows)
}
