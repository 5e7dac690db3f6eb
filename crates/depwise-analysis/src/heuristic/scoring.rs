//! Risk aggregation, confidence shaping and category weighting

use super::patterns::{self, ScanResult};
use crate::models::{CategoryKind, CategoryWeight, RiskLevel};

const BASE_CONFIDENCE: f64 = 0.6;
const BREAKING_PHRASE_BONUS: f64 = 0.2;
const SECURITY_KEYWORD_BONUS: f64 = 0.1;
const SHORT_TEXT_PENALTY: f64 = 0.2;
const SHORT_TEXT_CHARS: usize = 100;
const FALLBACK_MAINTENANCE_WEIGHT: f64 = 0.5;

/// Aggregate risk of a scanned changelog
///
/// Critical security findings dominate, then any security finding or breaking
/// change, then deprecations.
pub fn aggregate_risk(scan: &ScanResult) -> RiskLevel {
    if scan.max_security_severity() == Some(RiskLevel::Critical) {
        RiskLevel::Critical
    } else if !scan.security_fixes.is_empty() || !scan.breaking_changes.is_empty() {
        RiskLevel::High
    } else if !scan.deprecations.is_empty() {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Confidence in a heuristic judgment over `text`, clamped to `[0.1, 1.0]`
pub fn shape_confidence(text: &str, scan: &ScanResult) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if scan.breaking_phrase {
        confidence += BREAKING_PHRASE_BONUS;
    }
    if scan.has_security_keyword() || patterns::contains_security_keyword(text) {
        confidence += SECURITY_KEYWORD_BONUS;
    }
    if text.chars().count() < SHORT_TEXT_CHARS {
        confidence -= SHORT_TEXT_PENALTY;
    }
    confidence.clamp(0.1, 1.0)
}

/// Category reported when nothing else carries weight
pub fn fallback_category() -> CategoryWeight {
    CategoryWeight {
        category: CategoryKind::Maintenance,
        weight: FALLBACK_MAINTENANCE_WEIGHT,
    }
}

/// Category weights for classification, in reporting order
///
/// Only categories that accumulated weight are emitted. When nothing matched a
/// single maintenance category at 0.5 is returned.
pub fn category_weights(text: &str) -> Vec<CategoryWeight> {
    let mut weights: Vec<CategoryWeight> = patterns::category_hits(text)
        .into_iter()
        .filter(|(_, weight)| *weight > 0.0)
        .map(|(category, weight)| CategoryWeight { category, weight })
        .collect();

    if weights.is_empty() {
        weights.push(fallback_category());
    }

    weights.sort_by_key(|weight| {
        CategoryKind::ALL
            .iter()
            .position(|kind| *kind == weight.category)
            .unwrap_or(CategoryKind::ALL.len())
    });
    weights
}
