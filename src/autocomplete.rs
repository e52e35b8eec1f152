use std::collections::HashSet;

use crate::error::PreflightResult;
use crate::execmeta::utc_now_millis;
use crate::history::HistoryStore;
use crate::types::{
    ContractFunctionSchema, HistoryEntry, HistoryKey, Suggestion, SuggestionKind, SuggestionResult,
};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 20;

/// What the caller is currently typing into.
#[derive(Clone, Debug, Default)]
pub struct SuggestionContext {
    pub contract_id: String,
    pub function_name: Option<String>,
    pub parameter_name: Option<String>,
    pub parameter_type: Option<String>,
    pub current_input: String,
}

impl SuggestionContext {
    pub fn for_function(contract_id: &str, input: &str) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            current_input: input.to_string(),
            ..Default::default()
        }
    }

    pub fn for_parameter(
        contract_id: &str,
        function_name: &str,
        parameter_name: &str,
        parameter_type: Option<&str>,
        input: &str,
    ) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            function_name: Some(function_name.to_string()),
            parameter_name: Some(parameter_name.to_string()),
            parameter_type: parameter_type.map(ToOwned::to_owned),
            current_input: input.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SuggestionFilter {
    pub kinds: Option<Vec<SuggestionKind>>,
    pub limit: Option<usize>,
}

impl SuggestionFilter {
    pub fn kinds(kinds: &[SuggestionKind]) -> Self {
        Self {
            kinds: Some(kinds.to_vec()),
            limit: None,
        }
    }

    fn allows(&self, kind: SuggestionKind) -> bool {
        self.kinds.as_ref().is_none_or(|k| k.contains(&kind))
    }
}

/// Ranks history and schema candidates for one input field and records what
/// the user finally entered.
#[derive(Debug)]
pub struct AutocompleteEngine {
    history: HistoryStore,
    functions: Vec<ContractFunctionSchema>,
    last_contract_id: Option<String>,
}

impl AutocompleteEngine {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            history,
            functions: Vec::new(),
            last_contract_id: None,
        }
    }

    pub fn set_contract_functions(&mut self, functions: Vec<ContractFunctionSchema>) {
        self.functions = functions;
    }

    /// Contract id offered for `Address` parameters.
    pub fn set_last_contract_id(&mut self, contract_id: Option<String>) {
        self.last_contract_id = contract_id.filter(|s| !s.is_empty());
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn get_suggestions(
        &self,
        ctx: &SuggestionContext,
        filter: Option<&SuggestionFilter>,
    ) -> SuggestionResult {
        let default_filter = SuggestionFilter::default();
        let filter = filter.unwrap_or(&default_filter);
        let mut candidates = Vec::new();

        if filter.allows(SuggestionKind::History) {
            candidates.extend(self.history_candidates(ctx));
        }
        if ctx.function_name.is_none() {
            if filter.allows(SuggestionKind::Function) {
                candidates.extend(self.functions.iter().map(|f| Suggestion {
                    value: f.name.clone(),
                    kind: SuggestionKind::Function,
                    description: f.description.clone(),
                }));
            }
        } else if filter.allows(SuggestionKind::Pattern)
            && let Some(ty) = ctx.parameter_type.as_deref()
        {
            candidates.extend(self.pattern_hints(ty));
        }

        let prefix = ctx.current_input.to_lowercase();
        let mut seen = HashSet::new();
        let suggestions = candidates
            .into_iter()
            .filter(|s| s.value.to_lowercase().starts_with(&prefix))
            .filter(|s| seen.insert(s.value.clone()))
            .take(filter.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT))
            .collect();
        SuggestionResult { suggestions }
    }

    fn history_candidates(&self, ctx: &SuggestionContext) -> Vec<Suggestion> {
        let values = match ctx.function_name.as_deref() {
            None => self.history.function_names_for(&ctx.contract_id),
            Some(function_name) => self.history.values_for(HistoryKey {
                contract_id: &ctx.contract_id,
                function_name,
                parameter_name: ctx.parameter_name.as_deref(),
            }),
        };
        values
            .into_iter()
            .map(|v| Suggestion {
                value: v.to_string(),
                kind: SuggestionKind::History,
                description: Some("Recently used".to_string()),
            })
            .collect()
    }

    fn pattern_hints(&self, type_hint: &str) -> Vec<Suggestion> {
        let lower = type_hint.trim().to_ascii_lowercase();
        let hint = |value: &str, description: &str| Suggestion {
            value: value.to_string(),
            kind: SuggestionKind::Pattern,
            description: Some(description.to_string()),
        };
        match lower.as_str() {
            "bool" | "boolean" => vec![hint("true", "bool"), hint("false", "bool")],
            "u32" | "u64" | "u128" | "u256" | "i32" | "i64" | "i128" | "i256" => {
                vec![hint("0", type_hint)]
            }
            "address" => self
                .last_contract_id
                .as_deref()
                .map(|id| vec![hint(id, "Last used contract")])
                .unwrap_or_default(),
            "symbol" | "string" => vec![hint("\"\"", "Empty string")],
            t if t.starts_with("vec") => vec![hint("[]", "Empty vector")],
            t if t.starts_with("map") => vec![hint("{}", "Empty map")],
            _ => Vec::new(),
        }
    }

    /// Records and persists an entered value. Returns whether anything was added.
    pub fn record_input(&mut self, entry: HistoryEntry) -> PreflightResult<bool> {
        if !self.history.record(entry, utc_now_millis()) {
            return Ok(false);
        }
        self.history.save()?;
        Ok(true)
    }
}
