// Sanitization utilities
// Vendor error bodies are logged and surfaced to clients, so credentials that
// a vendor echoes back are masked first.

use regex::Regex;
use std::sync::OnceLock;

/// Longest vendor message kept after sanitization
pub const MAX_MESSAGE_CHARS: usize = 500;

const SECRET_PATTERNS: &[&str] = &[
    r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+",
    r"(?i)(api[_-]?key|xi-api-key|key|token)([=:]\s*)[A-Za-z0-9._~+/=-]+",
];

fn secret_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SECRET_PATTERNS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

pub struct DataSanitizer;

impl DataSanitizer {
    /// Mask credentials and truncate to [`MAX_MESSAGE_CHARS`]
    pub fn sanitize_for_logging(data: &str) -> String {
        let mut cleaned = data.to_string();
        for pattern in secret_patterns() {
            cleaned = pattern
                .replace_all(&cleaned, |caps: &regex::Captures<'_>| {
                    match (caps.get(1), caps.get(2)) {
                        (Some(name), Some(sep)) => format!("{}{}[REDACTED]", name.as_str(), sep.as_str()),
                        _ => "Bearer [REDACTED]".to_string(),
                    }
                })
                .into_owned();
        }

        if cleaned.chars().count() > MAX_MESSAGE_CHARS {
            let mut truncated: String = cleaned.chars().take(MAX_MESSAGE_CHARS).collect();
            truncated.push_str("...");
            truncated
        } else {
            cleaned
        }
    }
}
