//! Pre-flight checks for a proposed contract call.
//!
//! Schemas come from scraped help text, so only the contract id format, an
//! empty function name and missing required arguments are hard errors.
//! Everything else is reported as a warning the caller may override.

use serde_json::{Map, Value};

use crate::types::{ContractFunctionSchema, PredictedError, Severity, ValidationReport};

pub const INVALID_CONTRACT_ID: &str = "INVALID_CONTRACT_ID";
pub const MISSING_FUNCTION: &str = "MISSING_FUNCTION";
pub const UNKNOWN_FUNCTION: &str = "UNKNOWN_FUNCTION";
pub const MISSING_ARGUMENT: &str = "MISSING_ARGUMENT";
pub const TYPE_MISMATCH: &str = "TYPE_MISMATCH";
pub const UNKNOWN_ARGUMENT: &str = "UNKNOWN_ARGUMENT";
pub const ADDRESS_FORMAT: &str = "ADDRESS_FORMAT";

const STRKEY_LEN: usize = 56;

/// `^C[A-Z0-9]{55}$`
pub fn is_valid_contract_id(contract_id: &str) -> bool {
    is_strkey_shaped(contract_id, &['C'])
}

fn is_strkey_shaped(value: &str, prefixes: &[char]) -> bool {
    value.len() == STRKEY_LEN
        && value.chars().next().is_some_and(|c| prefixes.contains(&c))
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[derive(Default)]
struct ReportBuilder {
    report: ValidationReport,
}

impl ReportBuilder {
    fn error(&mut self, code: &str, message: String, suggestion: String) {
        self.report.predicted_errors.push(PredictedError {
            code: code.to_string(),
            message: message.clone(),
            severity: Severity::Error,
        });
        self.report.errors.push(message);
        self.report.suggestions.push(suggestion);
    }

    fn warning(&mut self, code: &str, message: String) {
        self.report.predicted_errors.push(PredictedError {
            code: code.to_string(),
            message: message.clone(),
            severity: Severity::Warning,
        });
        self.report.warnings.push(message);
    }

    fn finish(mut self) -> ValidationReport {
        self.report.valid = self.report.errors.is_empty();
        self.report
    }
}

pub fn validate(
    contract_id: &str,
    function_name: &str,
    args: &Map<String, Value>,
    matched: Option<&ContractFunctionSchema>,
    all: &[ContractFunctionSchema],
) -> ValidationReport {
    let mut out = ReportBuilder::default();
    let function_name = function_name.trim();

    if !is_valid_contract_id(contract_id) {
        out.error(
            INVALID_CONTRACT_ID,
            format!(
                "Invalid contract ID `{contract_id}`: expected C followed by 55 uppercase letters or digits"
            ),
            "Use the 56-character contract ID printed by the deploy step (starts with C)".to_string(),
        );
    }

    if function_name.is_empty() {
        out.error(
            MISSING_FUNCTION,
            "Function name is required".to_string(),
            "Provide the name of a function exported by the contract".to_string(),
        );
    } else if !all.is_empty() && !all.iter().any(|f| f.name == function_name) {
        let known: Vec<&str> = all.iter().map(|f| f.name.as_str()).collect();
        out.warning(
            UNKNOWN_FUNCTION,
            format!(
                "Function `{function_name}` was not found in the contract help (known: {})",
                known.join(", ")
            ),
        );
    }

    if let Some(schema) = matched {
        check_arguments(&mut out, schema, args);
    }
    out.finish()
}

fn check_arguments(out: &mut ReportBuilder, schema: &ContractFunctionSchema, args: &Map<String, Value>) {
    for param in schema.required_parameters() {
        if !args.contains_key(&param.name) {
            let type_note = param
                .type_hint
                .as_deref()
                .map(|t| format!(" ({t})"))
                .unwrap_or_default();
            out.error(
                MISSING_ARGUMENT,
                format!("Missing required argument `{}`", param.name),
                format!("Provide a value for `{}`{type_note}", param.name),
            );
        }
    }

    for (name, value) in args {
        let Some(param) = schema.parameter(name) else {
            out.warning(
                UNKNOWN_ARGUMENT,
                format!("Argument `{name}` is not declared by `{}`", schema.name),
            );
            continue;
        };
        let Some(type_hint) = param.type_hint.as_deref() else {
            continue;
        };
        match expected_shape(type_hint) {
            Some(Shape::Address) => {
                if !value.as_str().is_some_and(|s| is_strkey_shaped(s, &['G', 'C'])) {
                    out.warning(
                        ADDRESS_FORMAT,
                        format!(
                            "Argument `{name}` should be a G... account or C... contract address, got {}",
                            render(value)
                        ),
                    );
                }
            }
            Some(shape) => {
                if !shape.accepts(value) {
                    out.warning(
                        TYPE_MISMATCH,
                        format!(
                            "Argument `{name}` is declared as {type_hint} but got {}",
                            render(value)
                        ),
                    );
                }
            }
            None => {}
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shape {
    Unsigned,
    Signed,
    Bool,
    Address,
}

fn expected_shape(type_hint: &str) -> Option<Shape> {
    match type_hint.trim().to_ascii_lowercase().as_str() {
        "u32" | "u64" | "u128" | "u256" => Some(Shape::Unsigned),
        "i32" | "i64" | "i128" | "i256" => Some(Shape::Signed),
        "bool" | "boolean" => Some(Shape::Bool),
        "address" => Some(Shape::Address),
        _ => None,
    }
}

impl Shape {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Shape::Unsigned | Shape::Signed => {
                let signed = self == Shape::Signed;
                match value {
                    Value::Number(n) => n
                        .as_f64()
                        .is_some_and(|f| f.fract() == 0.0 && (signed || f >= 0.0)),
                    Value::String(s) => is_integer_literal(s, signed),
                    _ => false,
                }
            }
            Shape::Bool => match value {
                Value::Bool(_) => true,
                Value::String(s) => s == "true" || s == "false",
                _ => false,
            },
            Shape::Address => value.is_string(),
        }
    }
}

fn is_integer_literal(s: &str, signed: bool) -> bool {
    let digits = match s.strip_prefix('-') {
        Some(rest) if signed => rest,
        Some(_) => return false,
        None => s,
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn render(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 60 {
        let head: String = text.chars().take(57).collect();
        format!("{head}...")
    } else {
        text
    }
}
