use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    format!("{:x}", digest)
}

/// First non-empty line mentioning an error, else the first non-empty line.
pub fn summarize_failure(text: &str) -> Option<String> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.clone().next()?;
    let error_line = lines.find(|l| l.to_ascii_lowercase().contains("error"));
    Some(error_line.unwrap_or(first).to_string())
}

/// Pretty JSON on stdout; a render failure is reported on stderr.
pub fn print_json<T: Serialize>(context: &str, value: &T) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            true
        }
        Err(e) => {
            eprintln!("{context}: failed to render JSON: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_digest() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn summarize_prefers_error_lines() {
        let text = "\nℹ️ Simulating transaction…\n❌ error: HostError: Error(Contract, #3)\nmore";
        assert_eq!(
            summarize_failure(text).as_deref(),
            Some("❌ error: HostError: Error(Contract, #3)")
        );
        assert_eq!(summarize_failure("  only line ").as_deref(), Some("only line"));
        assert_eq!(summarize_failure("\n \n"), None);
    }
}
