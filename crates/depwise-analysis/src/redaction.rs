//! Credential scrubbing for error text surfaced from backends
//!
//! Backends occasionally echo request headers or keys in error bodies; anything
//! that ends up in an `AnalysisError` or a log line passes through [`redact`].

use once_cell::sync::Lazy;
use regex::Regex;

struct RedactionPattern {
    regex: Regex,
    replacement: &'static str,
}

fn pattern(regex: &str, replacement: &'static str) -> RedactionPattern {
    RedactionPattern {
        regex: Regex::new(regex).expect("redaction pattern is valid"),
        replacement,
    }
}

static PATTERNS: Lazy<Vec<RedactionPattern>> = Lazy::new(|| {
    vec![
        // Anthropic keys (sk-ant-*)
        pattern(r"sk-ant-[A-Za-z0-9_\-]{20,}", "[REDACTED_ANTHROPIC_KEY]"),
        // OpenAI keys (sk-*, sk-proj-*)
        pattern(r"sk-(?:proj-)?[A-Za-z0-9_\-]{20,}", "[REDACTED_OPENAI_KEY]"),
        // x-api-key header
        pattern(r"(?i)x-api-key:\s*[^\s,;]+", "x-api-key: [REDACTED]"),
        pattern(r"(?i)bearer\s+[A-Za-z0-9._\-/+=]+", "Bearer [REDACTED]"),
        pattern(r"(?i)authorization:\s*[^\s,;]+", "Authorization: [REDACTED]"),
        pattern(
            r"(?i)(ANTHROPIC|OPENAI)_API_KEY\s*=\s*[^\s,;]+",
            "${1}_API_KEY=[REDACTED]",
        ),
        pattern(
            r"(?i)(api[_-]?key|token|secret|password)\s*=\s*[^\s,;]+",
            "$1=[REDACTED]",
        ),
    ]
});

/// Replace credential-looking substrings in `input`
pub fn redact(input: &str) -> String {
    PATTERNS.iter().fold(input.to_string(), |text, pattern| {
        pattern
            .regex
            .replace_all(&text, pattern.replacement)
            .into_owned()
    })
}

/// Redact `input`, additionally scrubbing a known secret verbatim
pub fn redact_with_secret(input: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => redact(&input.replace(secret, "[REDACTED]")),
        _ => redact(input),
    }
}

/// Whether `input` contains anything [`redact`] would replace
pub fn contains_sensitive_info(input: &str) -> bool {
    PATTERNS.iter().any(|pattern| pattern.regex.is_match(input))
}
