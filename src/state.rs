//! `state.json`: persisted preferences plus the last contract id used.
//!
//! The file is a loose JSON document so unknown keys written by newer
//! versions survive a round trip.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths::{ensure_parent_dir, resolve_state_file};

const LAST_CONTRACT_ID: &str = "last_contract_id";

/// Dotted key (`preferences.network`) as a JSON pointer.
fn pointer(key: &str) -> String {
    key.split('.')
        .filter(|seg| !seg.is_empty())
        .fold(String::new(), |mut acc, seg| {
            acc.push('/');
            acc.push_str(&seg.replace('~', "~0").replace('/', "~1"));
            acc
        })
}

pub fn value_at_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    root.pointer(&pointer(key))
}

/// Writes `value` at a dotted key, replacing non-object intermediates.
pub fn set_value_at_path(root: &mut Value, key: &str, value: Value) -> Result<(), String> {
    let segs: Vec<&str> = key.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segs.split_last() else {
        return Err("key cannot be empty".to_string());
    };
    let mut node = root;
    for seg in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return Err(format!("cannot descend into `{seg}`"));
        };
        node = map
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), value);
    }
    Ok(())
}

/// Interprets a command-line value: JSON when it parses, case-insensitive
/// booleans, otherwise the raw text.
pub fn parse_cli_value(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Serialises to a sibling temp file and renames it over `path`.
pub fn write_json_atomic(path: &Path, value: &Value) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let mut text =
        serde_json::to_string_pretty(value).map_err(|e| format!("cannot encode JSON: {e}"))?;
    text.push('\n');
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, text).map_err(|e| format!("cannot write {}: {e}", tmp.display()))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        format!("cannot replace {}: {e}", path.display())
    })
}

pub struct StateStore {
    path: PathBuf,
    doc: Value,
}

impl StateStore {
    /// Opens the state file; a missing file yields an empty document that is
    /// only written on [`StateStore::save`].
    pub fn open(path: PathBuf) -> Result<Self, String> {
        let doc = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Value::Object(Map::new()),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| format!("invalid JSON in {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Map::new()),
            Err(e) => return Err(format!("cannot read {}: {e}", path.display())),
        };
        Ok(Self { path, doc })
    }

    pub fn open_default() -> Result<Self, String> {
        let path = resolve_state_file().ok_or_else(|| "unable to resolve state file".to_string())?;
        Self::open(path)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        value_at_path(&self.doc, key)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        set_value_at_path(&mut self.doc, key, value)
    }

    pub fn save(&self) -> Result<(), String> {
        write_json_atomic(&self.path, &self.doc)
    }

    pub fn into_value(self) -> Value {
        self.doc
    }
}

/// The whole state document, or `None` when it is missing or unreadable.
pub fn read_state_value() -> Option<Value> {
    let path = resolve_state_file()?;
    path.exists()
        .then(|| StateStore::open(path).ok())
        .flatten()
        .map(StateStore::into_value)
}

pub fn set_state_path(key: &str, value: Value) -> Result<(), String> {
    let mut store = StateStore::open_default()?;
    store.set(key, value)?;
    store.save()
}

pub fn last_contract_id() -> Option<String> {
    read_state_value()?
        .get(LAST_CONTRACT_ID)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

pub fn remember_contract_id(contract_id: &str) -> Result<(), String> {
    set_state_path(LAST_CONTRACT_ID, Value::String(contract_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn cli_values_parse_as_json_then_bool_then_text() {
        assert_eq!(parse_cli_value("false"), json!(false));
        assert_eq!(parse_cli_value("True"), json!(true));
        assert_eq!(parse_cli_value("30"), json!(30));
        assert_eq!(parse_cli_value("futurenet"), json!("futurenet"));
    }

    #[test]
    fn dotted_keys_create_intermediate_objects() {
        let mut doc = json!({ "preferences": "corrupt" });
        set_value_at_path(&mut doc, "preferences.network", json!("futurenet")).expect("set");
        assert_eq!(value_at_path(&doc, "preferences.network"), Some(&json!("futurenet")));
        assert!(set_value_at_path(&mut doc, ".", json!(1)).is_err());
    }

    #[test]
    fn store_keeps_unknown_keys_across_save() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, r#"{"future":{"flag":1}}"#).expect("seed");

        let mut store = StateStore::open(path.clone()).expect("open");
        store.set("last_contract_id", json!("CABC")).expect("set");
        store.save().expect("save");

        let reopened = StateStore::open(path.clone()).expect("reopen");
        assert_eq!(reopened.get("future.flag"), Some(&json!(1)));
        assert_eq!(reopened.get("last_contract_id"), Some(&json!("CABC")));
        assert!(!path.with_extension(format!("tmp.{}", std::process::id())).exists());
    }

    #[test]
    fn missing_file_opens_empty_and_is_not_created() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        let store = StateStore::open(path.clone()).expect("open");
        assert_eq!(store.get("preferences"), None);
        assert!(!path.exists());
    }
}
