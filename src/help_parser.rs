//! Recovers function schemas from the CLI's generated help text.
//!
//! The upstream tool offers no structured output, so everything here is line
//! scanning against the clap-style layout it prints today:
//!
//! ```text
//! Commands:
//!   transfer   Transfer tokens
//!   balance    Read a balance
//! Options:
//!   -h, --help  Print help
//! ```

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::{ContractFunctionSchema, ParameterSchema};

/// Result of scanning top-level help text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HelpParse {
    Parsed(Vec<ContractFunctionSchema>),
    /// Nothing recognisable; the raw text is kept for diagnostics.
    Unparsed { raw: String },
}

impl HelpParse {
    pub fn is_parsed(&self) -> bool {
        matches!(self, HelpParse::Parsed(_))
    }

    /// Degrades `Unparsed` to an empty list: callers fall back to manual entry.
    pub fn into_functions(self) -> Vec<ContractFunctionSchema> {
        match self {
            HelpParse::Parsed(functions) => functions,
            HelpParse::Unparsed { .. } => Vec::new(),
        }
    }
}

pub trait HelpParser {
    fn parse_functions(&self, help_text: &str) -> HelpParse;
    fn parse_function_help(&self, name: &str, help_text: &str) -> ContractFunctionSchema;
}

/// Grammar for clap-generated help, as printed by `contract invoke -- --help`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClapHelpParser;

impl HelpParser for ClapHelpParser {
    fn parse_functions(&self, help_text: &str) -> HelpParse {
        let functions = parse_functions(help_text);
        if functions.is_empty() {
            HelpParse::Unparsed {
                raw: help_text.to_string(),
            }
        } else {
            HelpParse::Parsed(functions)
        }
    }

    fn parse_function_help(&self, name: &str, help_text: &str) -> ContractFunctionSchema {
        parse_function_help(name, help_text)
    }
}

fn command_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)(?:\s+(.*))?$").expect("command line regex"))
}

fn usage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Usage:\s+(\w+)\s+\[OPTIONS\]").expect("usage regex"))
}

fn parameter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Types nest up to two levels deep: `Vec<Map<Symbol, u32>>`.
        Regex::new(
            r"^-{1,2}([\w-]+)(?:\s+<((?:[^<>]|<(?:[^<>]|<[^<>]*>)*>)+)>)?(?:\s+(.+))?$",
        )
        .expect("parameter regex")
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CommandScan {
    Seeking,
    InCommands,
    Done,
}

/// Function names listed under `Commands:`, in first-seen order.
///
/// Falls back to `Usage: <name> [OPTIONS]` occurrences when the section is
/// missing; returns an empty list when neither shape is present.
pub fn parse_functions(help_text: &str) -> Vec<ContractFunctionSchema> {
    let mut functions = Vec::new();
    let mut seen = HashSet::new();
    let mut state = CommandScan::Seeking;

    for raw_line in help_text.lines() {
        if state == CommandScan::Done {
            break;
        }
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if lower.contains("commands:") || lower.contains("subcommands:") {
            state = CommandScan::InCommands;
            continue;
        }
        if state == CommandScan::InCommands
            && (lower.contains("options:") || lower.contains("global options:"))
        {
            state = CommandScan::Done;
            continue;
        }
        if state != CommandScan::InCommands {
            continue;
        }
        let Some(caps) = command_line_re().captures(line) else {
            continue;
        };
        let name = caps[1].to_string();
        if !seen.insert(name.clone()) {
            continue;
        }
        let description = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|d| !d.is_empty());
        functions.push(ContractFunctionSchema {
            name,
            description,
            parameters: Vec::new(),
        });
    }

    if functions.is_empty() {
        for caps in usage_re().captures_iter(help_text) {
            let name = caps[1].to_string();
            if seen.insert(name.clone()) {
                functions.push(ContractFunctionSchema::bare(&name));
            }
        }
    }
    functions
}

fn marks_optional(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("[optional]") || lower.contains("optional") || lower.contains("default:")
}

/// Parameters from one function's help: `--name <TYPE>  description` lines
/// after an `Options:`/`Arguments:`/`Parameters:` header.
pub fn parse_function_help(name: &str, help_text: &str) -> ContractFunctionSchema {
    let mut schema = ContractFunctionSchema::bare(name);
    let mut in_parameters = false;

    for raw_line in help_text.lines() {
        let line = raw_line.trim();
        let lower = line.to_lowercase();
        if lower.contains("options:") || lower.contains("arguments:") || lower.contains("parameters:")
        {
            in_parameters = true;
            continue;
        }
        if in_parameters && lower.contains("usage:") {
            break;
        }
        if !in_parameters || line.is_empty() {
            continue;
        }
        // Non-matching lines (wrapped descriptions, examples) are noise, not terminators.
        let Some(caps) = parameter_re().captures(line) else {
            continue;
        };
        let param_name = caps[1].to_string();
        if schema.parameter(&param_name).is_some() {
            continue;
        }
        schema.parameters.push(ParameterSchema {
            name: param_name,
            type_hint: caps.get(2).map(|m| m.as_str().trim().to_string()),
            required: !marks_optional(line),
            description: caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .filter(|d| !d.is_empty()),
        });
    }
    schema
}
