//! Keyword tables and the single-pass text scanner used by the heuristic analyzer

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{
    BreakingChange, BugFix, CategoryKind, Deprecation, Feature, RiskLevel, SecurityFix,
};

/// Finding category a change pattern contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Breaking,
    Feature,
    BugFix,
    Deprecation,
}

/// A literal, lowercase substring and the confidence of the finding it produces
#[derive(Debug, Clone, Copy)]
pub struct ChangePattern {
    pub needle: &'static str,
    pub kind: ChangeKind,
    pub confidence: f64,
}

/// A security keyword and the severity it implies
#[derive(Debug, Clone, Copy)]
pub struct SecurityPattern {
    pub needle: &'static str,
    pub severity: RiskLevel,
    pub confidence: f64,
}

const fn change(needle: &'static str, kind: ChangeKind, confidence: f64) -> ChangePattern {
    ChangePattern {
        needle,
        kind,
        confidence,
    }
}

const fn security(needle: &'static str, severity: RiskLevel, confidence: f64) -> SecurityPattern {
    SecurityPattern {
        needle,
        severity,
        confidence,
    }
}

pub const CHANGE_PATTERNS: &[ChangePattern] = &[
    change("breaking change", ChangeKind::Breaking, 0.95),
    change("breaking", ChangeKind::Breaking, 0.7),
    change("backwards incompatible", ChangeKind::Breaking, 0.9),
    change("backward incompatible", ChangeKind::Breaking, 0.9),
    change("no longer supported", ChangeKind::Breaking, 0.75),
    change("dropped support", ChangeKind::Breaking, 0.75),
    change("migration required", ChangeKind::Breaking, 0.8),
    change("removed", ChangeKind::Breaking, 0.6),
    change("new feature", ChangeKind::Feature, 0.9),
    change("added", ChangeKind::Feature, 0.7),
    change("adds support", ChangeKind::Feature, 0.75),
    change("now supports", ChangeKind::Feature, 0.7),
    change("introduce", ChangeKind::Feature, 0.6),
    change("bug fix", ChangeKind::BugFix, 0.9),
    change("bugfix", ChangeKind::BugFix, 0.9),
    change("fixed", ChangeKind::BugFix, 0.8),
    change("fixes", ChangeKind::BugFix, 0.75),
    change("resolved", ChangeKind::BugFix, 0.6),
    change("deprecated", ChangeKind::Deprecation, 0.9),
    change("deprecation", ChangeKind::Deprecation, 0.85),
    change("will be removed", ChangeKind::Deprecation, 0.8),
];

pub const SECURITY_PATTERNS: &[SecurityPattern] = &[
    security("exploit", RiskLevel::Critical, 0.9),
    security("remote code execution", RiskLevel::Critical, 0.9),
    security("arbitrary code", RiskLevel::Critical, 0.85),
    security("privilege escalation", RiskLevel::Critical, 0.85),
    security("vulnerability", RiskLevel::High, 0.85),
    security("vulnerable", RiskLevel::High, 0.8),
    security("cve-", RiskLevel::High, 0.9),
    security("xss", RiskLevel::High, 0.85),
    security("cross-site scripting", RiskLevel::High, 0.85),
    security("injection", RiskLevel::High, 0.8),
    security("denial of service", RiskLevel::High, 0.8),
    security("prototype pollution", RiskLevel::High, 0.8),
    security("buffer overflow", RiskLevel::High, 0.8),
    security("csrf", RiskLevel::Medium, 0.75),
    security("security", RiskLevel::Medium, 0.6),
];

/// Keywords counted toward each classification category
pub const CATEGORY_KEYWORDS: &[(CategoryKind, f64, &[&str])] = &[
    (
        CategoryKind::Security,
        0.3,
        &["security", "vulnerability", "cve-", "exploit", "xss", "injection", "csrf"],
    ),
    (
        CategoryKind::Feature,
        0.2,
        &["feature", "added", "new ", "introduce", "support for"],
    ),
    (
        CategoryKind::Bugfix,
        0.2,
        &["fix", "bug", "resolved", "issue", "crash", "regression"],
    ),
    (
        CategoryKind::Maintenance,
        0.1,
        &[
            "chore", "refactor", "dependencies", "bump", "docs", "documentation", "cleanup",
            "upgrade",
        ],
    ),
    (
        CategoryKind::Performance,
        0.2,
        &["performance", "faster", "speed", "optimiz", "memory usage", "latency"],
    ),
];

static CVE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,7}\b").expect("CVE pattern is valid"));

static CVSS_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bCVSS(?:v?\d(?:\.\d)?)?(?:\s+score)?\s*[:=]?\s*(\d{1,2}(?:\.\d)?)")
        .expect("CVSS pattern is valid")
});

/// Everything the scanner found in one body of text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub breaking_changes: Vec<BreakingChange>,
    pub features: Vec<Feature>,
    pub bug_fixes: Vec<BugFix>,
    pub security_fixes: Vec<SecurityFix>,
    pub deprecations: Vec<Deprecation>,
    /// The literal phrase "breaking change" occurs in the text
    pub breaking_phrase: bool,
}

impl ScanResult {
    pub fn has_security_keyword(&self) -> bool {
        !self.security_fixes.is_empty()
    }

    pub fn max_security_severity(&self) -> Option<RiskLevel> {
        self.security_fixes.iter().map(|fix| fix.severity).max()
    }

    pub fn finding_count(&self) -> usize {
        self.breaking_changes.len()
            + self.features.len()
            + self.bug_fixes.len()
            + self.security_fixes.len()
            + self.deprecations.len()
    }
}

/// Scan `text` once against every table
///
/// Each matching table entry contributes exactly one finding, described by the
/// sentence around its first occurrence.
pub fn scan(text: &str) -> ScanResult {
    let lowered = text.to_ascii_lowercase();
    let mut result = ScanResult {
        breaking_phrase: lowered.contains("breaking change"),
        ..ScanResult::default()
    };

    for pattern in CHANGE_PATTERNS {
        let Some(at) = lowered.find(pattern.needle) else {
            continue;
        };
        let description = sentence_at(text, at);
        match pattern.kind {
            ChangeKind::Breaking => result.breaking_changes.push(BreakingChange {
                affected_api: None,
                migration: None,
                description,
                confidence: pattern.confidence,
            }),
            ChangeKind::Feature => result.features.push(Feature {
                description,
                confidence: pattern.confidence,
            }),
            ChangeKind::BugFix => result.bug_fixes.push(BugFix {
                description,
                confidence: pattern.confidence,
            }),
            ChangeKind::Deprecation => result.deprecations.push(Deprecation {
                replacement: replacement_hint(&description),
                description,
                confidence: pattern.confidence,
            }),
        }
    }

    for pattern in SECURITY_PATTERNS {
        let Some(at) = lowered.find(pattern.needle) else {
            continue;
        };
        let description = sentence_at(text, at);
        result.security_fixes.push(SecurityFix {
            cve_id: extract_cve(&description),
            cvss_score: extract_cvss(&description),
            severity: pattern.severity,
            description,
            confidence: pattern.confidence,
        });
    }

    result
}

/// Whether any security keyword occurs in `text`
pub fn contains_security_keyword(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    SECURITY_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern.needle))
}

/// First CVE identifier literally present in `text`, upper-cased
pub fn extract_cve(text: &str) -> Option<String> {
    CVE_ID.find(text).map(|m| m.as_str().to_ascii_uppercase())
}

/// First CVSS score literally present in `text`, if it lies in `[0, 10]`
pub fn extract_cvss(text: &str) -> Option<f64> {
    let captures = CVSS_SCORE.captures(text)?;
    let score: f64 = captures.get(1)?.as_str().parse().ok()?;
    (0.0..=10.0).contains(&score).then_some(score)
}

/// Sum keyword hits per category
///
/// Each keyword present in the text adds the category's increment once. Weights
/// are independent relevance scores capped at 1.0, not a distribution.
pub fn category_hits(text: &str) -> Vec<(CategoryKind, f64)> {
    let lowered = text.to_ascii_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .map(|(category, increment, keywords)| {
            let hits = keywords
                .iter()
                .filter(|keyword| lowered.contains(**keyword))
                .count();
            (*category, (hits as f64 * increment).min(1.0))
        })
        .collect()
}

/// "use X instead" / "replaced by X" / "in favor of X"
fn replacement_hint(sentence: &str) -> Option<String> {
    static REPLACEMENT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(?:use\s+`?([\w.:/-]+)`?\s+instead|replaced\s+(?:by|with)\s+`?([\w.:/-]+)`?|in\s+favou?r\s+of\s+`?([\w.:/-]+)`?)")
            .expect("replacement pattern is valid")
    });

    let captures = REPLACEMENT.captures(sentence)?;
    (1..=3)
        .find_map(|index| captures.get(index))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

const MAX_DESCRIPTION_CHARS: usize = 240;

/// The sentence or line of `text` containing byte offset `at`
///
/// Offsets come from an ASCII-lowercased copy, so they are valid char
/// boundaries in `text` as well.
fn sentence_at(text: &str, at: usize) -> String {
    let bytes = text.as_bytes();
    let is_terminator = |i: usize| {
        matches!(bytes[i], b'.' | b'!' | b'?')
            && bytes.get(i + 1).map_or(true, |next| next.is_ascii_whitespace())
    };

    let mut start = at;
    while start > 0 {
        if bytes[start - 1] == b'\n' || is_terminator(start - 1) {
            break;
        }
        start -= 1;
    }

    let mut end = at;
    while end < bytes.len() {
        if bytes[end] == b'\n' {
            break;
        }
        if is_terminator(end) {
            end += 1;
            break;
        }
        end += 1;
    }

    let sentence = text[start..end]
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '+' | '#') || c.is_whitespace())
        .trim();

    if sentence.chars().count() > MAX_DESCRIPTION_CHARS {
        let truncated: String = sentence.chars().take(MAX_DESCRIPTION_CHARS).collect();
        format!("{}...", truncated.trim_end())
    } else {
        sentence.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_breaking_and_security() {
        let result =
            scan("BREAKING CHANGE: removed X. Fixed a security vulnerability (CVE-2024-0001).");

        assert!(result.breaking_phrase);
        // "breaking change", "breaking", "removed"
        assert_eq!(result.breaking_changes.len(), 3);
        assert_eq!(result.breaking_changes[0].confidence, 0.95);
        assert_eq!(result.breaking_changes[0].description, "BREAKING CHANGE: removed X.");

        assert!(result
            .security_fixes
            .iter()
            .any(|fix| fix.cve_id.as_deref() == Some("CVE-2024-0001")));
        assert_eq!(result.max_security_severity(), Some(RiskLevel::High));
        assert_eq!(result.bug_fixes.len(), 1);
    }

    #[test]
    fn test_exploit_is_critical() {
        let result = scan("Patched an exploit in the parser");
        assert_eq!(result.max_security_severity(), Some(RiskLevel::Critical));
    }

    #[test]
    fn test_identifiers_are_never_fabricated() {
        let result = scan("Security hardening for the session store.");
        assert_eq!(result.security_fixes.len(), 1);
        assert_eq!(result.security_fixes[0].cve_id, None);
        assert_eq!(result.security_fixes[0].cvss_score, None);
    }

    #[test]
    fn test_extract_cvss() {
        assert_eq!(extract_cvss("CVSS: 9.8 critical"), Some(9.8));
        assert_eq!(extract_cvss("rated CVSS 7.5"), Some(7.5));
        assert_eq!(extract_cvss("CVSSv3.1 score 6.1"), Some(6.1));
        assert_eq!(extract_cvss("CVSS 42"), None);
        assert_eq!(extract_cvss("no score here"), None);
    }

    #[test]
    fn test_extract_cve_uppercases() {
        assert_eq!(
            extract_cve("fixes cve-2023-12345 in parser"),
            Some("CVE-2023-12345".to_string())
        );
        assert_eq!(extract_cve("CVE-20-1"), None);
    }

    #[test]
    fn test_deprecation_replacement_hint() {
        let result = scan("The `request` helper is deprecated, use fetchJson instead.");
        assert_eq!(result.deprecations.len(), 1);
        assert_eq!(
            result.deprecations[0].replacement.as_deref(),
            Some("fetchJson")
        );
    }

    #[test]
    fn test_sentence_at_handles_versions_and_bullets() {
        let text = "## 2.0.0\n- Dropped support for Node 1.2.3 users.\n- Added streaming";
        let at = text.to_ascii_lowercase().find("dropped support").unwrap();
        assert_eq!(sentence_at(text, at), "Dropped support for Node 1.2.3 users.");
    }

    #[test]
    fn test_category_hits() {
        let hits = category_hits("Fixed a crash and improved performance");
        let weight = |kind| hits.iter().find(|(k, _)| *k == kind).unwrap().1;
        assert_eq!(weight(CategoryKind::Bugfix), 0.4);
        assert_eq!(weight(CategoryKind::Performance), 0.2);
        assert_eq!(weight(CategoryKind::Security), 0.0);
    }

    #[test]
    fn test_empty_text_has_no_findings() {
        let result = scan("");
        assert_eq!(result.finding_count(), 0);
        assert!(!result.breaking_phrase);
        assert!(!contains_security_keyword(""));
    }
}
