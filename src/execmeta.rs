use chrono::{DateTime, Utc};

pub fn output_preview(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub fn make_event_id(label: &str) -> String {
    format!(
        "{}_{}_{}",
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
        label.replace(
            |c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-',
            "_"
        ),
        std::process::id()
    )
}

pub fn utc_now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn utc_now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Renders a stored Unix-millisecond timestamp; out-of-range values print raw.
pub fn iso_from_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ms.to_string())
}
