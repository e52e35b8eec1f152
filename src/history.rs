use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PreflightError, PreflightResult};
use crate::execmeta::output_preview;
use crate::state::write_json_atomic;
use crate::types::{HistoryEntry, HistoryKey, HistoryRecord};

const HISTORY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    #[serde(default)]
    records: Vec<HistoryRecord>,
}

/// Previously entered values, oldest first, capped per key.
///
/// Records are only ever appended or evicted; saving rewrites the whole file,
/// so concurrent writers resolve to last-write-wins.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: Option<PathBuf>,
    limit: usize,
    records: Vec<HistoryRecord>,
}

impl HistoryStore {
    pub fn in_memory(limit: usize) -> Self {
        Self {
            path: None,
            limit: limit.max(1),
            records: Vec::new(),
        }
    }

    /// An empty history that saves to `path`, whatever the file holds now.
    pub fn at(path: &Path, limit: usize) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            ..Self::in_memory(limit)
        }
    }

    /// A missing file is an empty history.
    pub fn load(path: &Path, limit: usize) -> PreflightResult<Self> {
        let mut store = Self::at(path, limit);
        if !path.exists() {
            return Ok(store);
        }
        let text = fs::read_to_string(path)
            .map_err(|e| PreflightError::io(format!("cannot read {}", path.display()), e))?;
        if text.trim().is_empty() {
            return Ok(store);
        }
        let file: HistoryFile =
            serde_json::from_str(&text).map_err(|source| PreflightError::JsonFile {
                file: path.to_path_buf(),
                content_preview: output_preview(&text, 120),
                source,
            })?;
        if file.version != HISTORY_FORMAT_VERSION {
            return Err(PreflightError::invalid(format!(
                "unsupported history version {} in {}",
                file.version,
                path.display()
            )));
        }
        store.records = file.records;
        store.enforce_limit();
        Ok(store)
    }

    pub fn save(&self) -> PreflightResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = HistoryFile {
            version: HISTORY_FORMAT_VERSION,
            records: self.records.clone(),
        };
        let value =
            serde_json::to_value(&file).map_err(|e| PreflightError::json("history serialize", e))?;
        write_json_atomic(path, &value).map_err(PreflightError::invalid)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Appends under the entry's key. Returns false when the value repeats the
    /// most recent one for that key.
    pub fn record(&mut self, entry: HistoryEntry, timestamp_ms: i64) -> bool {
        let record = HistoryRecord {
            value: entry.value,
            contract_id: entry.contract_id,
            function_name: entry.function_name,
            parameter_name: entry.parameter_name,
            timestamp: timestamp_ms,
        };
        let key = record.key();
        if self
            .records
            .iter()
            .rev()
            .find(|r| r.key() == key)
            .is_some_and(|last| last.value == record.value)
        {
            return false;
        }
        let mut count = self.records.iter().filter(|r| r.key() == key).count();
        while count >= self.limit
            && let Some(oldest) = self.records.iter().position(|r| r.key() == key)
        {
            self.records.remove(oldest);
            count -= 1;
        }
        self.records.push(record);
        true
    }

    /// Drops the oldest records of every key holding more than `limit`,
    /// as happens when a file is reloaded under a lower limit.
    fn enforce_limit(&mut self) {
        let limit = self.limit;
        let mut counts: HashMap<HistoryKey<'_>, usize> = HashMap::new();
        let mut keep: Vec<bool> = self
            .records
            .iter()
            .rev()
            .map(|r| {
                let seen = counts.entry(r.key()).or_default();
                *seen += 1;
                *seen <= limit
            })
            .collect();
        keep.reverse();
        let mut flags = keep.into_iter();
        self.records.retain(|_| flags.next().unwrap_or(true));
    }

    /// Values recorded under `key`, most recent first.
    pub fn values_for(&self, key: HistoryKey<'_>) -> Vec<&str> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.key() == key)
            .map(|r| r.value.as_str())
            .collect()
    }

    /// Distinct function names used with a contract, most recent first.
    pub fn function_names_for(&self, contract_id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .rev()
            .filter(|r| r.contract_id == contract_id && !r.function_name.is_empty())
            .map(|r| r.function_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Most recent contract id recorded, if any.
    pub fn last_contract_id(&self) -> Option<&str> {
        self.records
            .last()
            .map(|r| r.contract_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ID: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";

    fn entry(value: &str, function: &str, param: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            value: value.to_string(),
            contract_id: ID.to_string(),
            function_name: function.to_string(),
            parameter_name: param.map(ToOwned::to_owned),
        }
    }

    fn key<'a>(function: &'a str, param: Option<&'a str>) -> HistoryKey<'a> {
        HistoryKey {
            contract_id: ID,
            function_name: function,
            parameter_name: param,
        }
    }

    #[test]
    fn adjacent_duplicate_is_not_recorded() {
        let mut store = HistoryStore::in_memory(10);
        assert!(store.record(entry("5", "transfer", Some("amount")), 1));
        assert!(!store.record(entry("5", "transfer", Some("amount")), 2));
        assert!(store.record(entry("7", "transfer", Some("amount")), 3));
        assert!(store.record(entry("5", "transfer", Some("amount")), 4));
        assert_eq!(store.values_for(key("transfer", Some("amount"))), vec!["5", "7", "5"]);
    }

    #[test]
    fn duplicate_check_is_per_key() {
        let mut store = HistoryStore::in_memory(10);
        assert!(store.record(entry("5", "transfer", Some("amount")), 1));
        assert!(store.record(entry("9", "mint", Some("amount")), 2));
        assert!(!store.record(entry("5", "transfer", Some("amount")), 3));
    }

    #[test]
    fn cap_evicts_oldest_for_that_key_only() {
        let mut store = HistoryStore::in_memory(2);
        store.record(entry("other", "mint", Some("to")), 0);
        for (i, v) in ["a", "b", "c"].iter().enumerate() {
            store.record(entry(v, "transfer", Some("to")), i as i64 + 1);
        }
        assert_eq!(store.values_for(key("transfer", Some("to"))), vec!["c", "b"]);
        assert_eq!(store.values_for(key("mint", Some("to"))), vec!["other"]);
        assert_eq!(store.records().len(), 3);
    }

    #[test]
    fn reload_under_lower_limit_keeps_most_recent() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::load(&path, 10).expect("load missing");
        for i in 0..10 {
            store.record(entry(&i.to_string(), "transfer", Some("amount")), i);
        }
        store.record(entry("x", "mint", Some("to")), 10);
        store.save().expect("save");

        let mut reloaded = HistoryStore::load(&path, 3).expect("reload");
        assert_eq!(
            reloaded.values_for(key("transfer", Some("amount"))),
            vec!["9", "8", "7"]
        );
        assert_eq!(reloaded.values_for(key("mint", Some("to"))), vec!["x"]);

        reloaded.record(entry("10", "transfer", Some("amount")), 11);
        assert_eq!(
            reloaded.values_for(key("transfer", Some("amount"))),
            vec!["10", "9", "8"]
        );
    }

    #[test]
    fn record_shrinks_an_over_cap_key() {
        let mut store = HistoryStore::in_memory(10);
        for i in 0..6 {
            store.record(entry(&i.to_string(), "transfer", Some("amount")), i);
        }
        store.limit = 2;
        store.record(entry("6", "transfer", Some("amount")), 6);
        assert_eq!(store.values_for(key("transfer", Some("amount"))), vec!["6", "5"]);
    }

    #[test]
    fn function_names_are_distinct_and_recent_first() {
        let mut store = HistoryStore::in_memory(10);
        store.record(entry("transfer", "transfer", None), 1);
        store.record(entry("balance", "balance", None), 2);
        store.record(entry("1", "transfer", Some("amount")), 3);
        assert_eq!(store.function_names_for(ID), vec!["transfer", "balance"]);
        assert!(store.function_names_for("CX").is_empty());
        assert_eq!(store.last_contract_id(), Some(ID));
    }

    #[test]
    fn save_then_load_preserves_records() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::load(&path, 10).expect("load missing");
        assert!(store.is_empty());
        store.record(entry("7", "transfer", Some("amount")), 42);
        store.save().expect("save");

        let text = fs::read_to_string(&path).expect("read");
        let raw: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["records"][0]["functionName"], "transfer");

        let reloaded = HistoryStore::load(&path, 10).expect("reload");
        assert_eq!(reloaded.records(), store.records());
    }

    #[test]
    fn corrupt_file_reports_path_and_preview() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        fs::write(&path, "{not json").expect("write");
        let err = HistoryStore::load(&path, 10).expect_err("should fail");
        let msg = err.to_string();
        assert!(msg.contains("history.json"), "{msg}");
        assert!(msg.contains("{not json"), "{msg}");
    }
}
