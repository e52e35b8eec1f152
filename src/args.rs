use serde_json::{Map, Value};

/// Parses user-supplied JSON with a message suitable for direct display.
pub fn parse_json(input: &str) -> Result<Value, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Input is empty".to_string());
    }
    serde_json::from_str(trimmed).map_err(|e| format!("Invalid JSON: {e}"))
}

/// Positional view of an argument payload: arrays as-is, object values in
/// key order, anything else wrapped.
pub fn parse_function_args(input: &str) -> Result<Vec<Value>, String> {
    Ok(match parse_json(input)? {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        other => vec![other],
    })
}

/// Named arguments for manual entry; blank input means no arguments.
pub fn parse_args_object(input: &str) -> Result<Map<String, Value>, String> {
    if input.trim().is_empty() {
        return Ok(Map::new());
    }
    match parse_json(input)? {
        Value::Object(map) => Ok(map),
        _ => Err("Arguments must be a JSON object".to_string()),
    }
}

/// One parameter value: JSON when it parses, otherwise the raw text.
pub fn parse_argument_value(raw: &str) -> Value {
    serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.to_string()))
}
