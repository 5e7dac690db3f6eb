//! Semantic-version extraction and update classification

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::UpdateType;

static VERSION_TRIPLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z][0-9A-Za-z.\-]*))?")
        .expect("version pattern is valid")
});

/// The numeric core of a version string plus its prerelease suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTriple {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
}

/// Extract the first `major.minor.patch` triple from a version string
///
/// Leading `v`, ecosystem prefixes (`react@`) and range operators are ignored
/// because only the first numeric triple is read.
pub fn parse_version(version: &str) -> Option<VersionTriple> {
    let captures = VERSION_TRIPLE.captures(version)?;
    let number = |index: usize| -> Option<u64> { captures.get(index)?.as_str().parse().ok() };

    Some(VersionTriple {
        major: number(1)?,
        minor: number(2)?,
        patch: number(3)?,
        prerelease: captures.get(4).map(|m| m.as_str().to_string()),
    })
}

/// Classify the update from `from` to `to`
///
/// Major increase wins, then minor increase, otherwise patch. A prerelease
/// suffix on the target overrides the result. Unparseable input yields
/// `Unknown` instead of an error.
pub fn determine_update_type(from: &str, to: &str) -> UpdateType {
    let (Some(from), Some(to)) = (parse_version(from), parse_version(to)) else {
        return UpdateType::Unknown;
    };

    if to.prerelease.is_some() {
        return UpdateType::Prerelease;
    }

    if to.major > from.major {
        UpdateType::Major
    } else if to.minor > from.minor {
        UpdateType::Minor
    } else {
        UpdateType::Patch
    }
}

/// Fixed compatibility score for an update type
pub fn compatibility_score(update_type: UpdateType) -> f64 {
    match update_type {
        UpdateType::Major => 0.3,
        UpdateType::Minor => 0.8,
        UpdateType::Patch => 0.95,
        UpdateType::Prerelease => 0.5,
        UpdateType::Unknown => 0.7,
    }
}
