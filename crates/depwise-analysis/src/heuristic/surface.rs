//! Public API surface changes derived from file records and unified diffs

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ApiChange, ApiChangeKind, FileChange, FileChangeType};

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^([+-])\s*(?:export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|let|var|interface|type|enum)|pub\s+(?:async\s+)?(?:fn|struct|enum|trait|type|const|mod)|def|class|func)\s+([A-Za-z_]\w*)",
    )
    .expect("declaration pattern is valid")
});

/// Whether a path looks like part of a package's public surface
pub fn is_public_surface(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let file = lower.rsplit('/').next().unwrap_or(lower.as_str());

    lower.ends_with(".d.ts")
        || file.starts_with("index.")
        || file == "lib.rs"
        || file == "mod.rs"
        || file == "__init__.py"
        || lower.starts_with("api/")
        || lower.contains("/api/")
        || lower.starts_with("include/")
        || lower.contains("/include/")
}

/// API changes implied by file change records on public surface files
pub fn from_file_changes(changes: &[FileChange]) -> Vec<ApiChange> {
    changes
        .iter()
        .filter(|change| is_public_surface(&change.path))
        .filter_map(|change| match change.change_type {
            FileChangeType::Deleted => Some(ApiChange {
                kind: ApiChangeKind::Removed,
                element: change.path.clone(),
                description: format!("Public module {} was deleted", change.path),
                breaking: true,
                confidence: 0.8,
            }),
            FileChangeType::Renamed => Some(ApiChange {
                kind: ApiChangeKind::Renamed,
                element: change.path.clone(),
                description: format!("Public module {} was renamed", change.path),
                breaking: true,
                confidence: 0.6,
            }),
            FileChangeType::Added => Some(ApiChange {
                kind: ApiChangeKind::Added,
                element: change.path.clone(),
                description: format!("Public module {} was added", change.path),
                breaking: false,
                confidence: 0.6,
            }),
            FileChangeType::Modified if change.lines_removed > 0 => Some(ApiChange {
                kind: ApiChangeKind::Modified,
                element: change.path.clone(),
                description: format!(
                    "{} lines removed and {} added in public module {}",
                    change.lines_removed, change.lines_added, change.path
                ),
                breaking: change.lines_removed > change.lines_added,
                confidence: 0.5,
            }),
            FileChangeType::Modified => None,
        })
        .collect()
}

/// API changes implied by declarations added or removed in a unified diff
///
/// A name both removed and re-added is reported once as modified.
pub fn from_diff(diff: &str) -> Vec<ApiChange> {
    let mut removed: Vec<&str> = Vec::new();
    let mut added: Vec<&str> = Vec::new();

    for captures in DECLARATION.captures_iter(diff) {
        let (Some(sign), Some(name)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let bucket = if sign.as_str() == "-" {
            &mut removed
        } else {
            &mut added
        };
        if !bucket.contains(&name.as_str()) {
            bucket.push(name.as_str());
        }
    }

    let mut changes = Vec::new();
    for name in &removed {
        if added.contains(name) {
            changes.push(ApiChange {
                kind: ApiChangeKind::Modified,
                element: name.to_string(),
                description: format!("Signature of {} changed", name),
                breaking: true,
                confidence: 0.6,
            });
        } else {
            changes.push(ApiChange {
                kind: ApiChangeKind::Removed,
                element: name.to_string(),
                description: format!("{} was removed", name),
                breaking: true,
                confidence: 0.75,
            });
        }
    }
    for name in added.iter().filter(|name| !removed.contains(*name)) {
        changes.push(ApiChange {
            kind: ApiChangeKind::Added,
            element: name.to_string(),
            description: format!("{} was added", name),
            breaking: false,
            confidence: 0.7,
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, change_type: FileChangeType, added: u32, removed: u32) -> FileChange {
        FileChange {
            path: path.to_string(),
            change_type,
            lines_added: added,
            lines_removed: removed,
        }
    }

    #[test]
    fn test_public_surface_paths() {
        assert!(is_public_surface("types/index.d.ts"));
        assert!(is_public_surface("src/index.js"));
        assert!(is_public_surface("src/lib.rs"));
        assert!(is_public_surface("pkg/__init__.py"));
        assert!(is_public_surface("src/api/client.ts"));
        assert!(!is_public_surface("src/internal/helpers.ts"));
        assert!(!is_public_surface("README.md"));
    }

    #[test]
    fn test_from_file_changes() {
        let changes = from_file_changes(&[
            file("src/index.ts", FileChangeType::Modified, 10, 40),
            file("src/api/legacy.ts", FileChangeType::Deleted, 0, 120),
            file("src/util.ts", FileChangeType::Deleted, 0, 50),
            file("src/lib.rs", FileChangeType::Modified, 5, 0),
        ]);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ApiChangeKind::Modified);
        assert!(changes[0].breaking);
        assert_eq!(changes[1].kind, ApiChangeKind::Removed);
        assert_eq!(changes[1].element, "src/api/legacy.ts");
    }

    #[test]
    fn test_from_diff_pairs_declarations() {
        let diff = "\
--- a/src/index.ts
+++ b/src/index.ts
-export function parse(input: string) {
+export function parse(input: string, options: Options) {
-export const LEGACY_MODE = true;
+export class Parser {
";
        let changes = from_diff(diff);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].kind, ApiChangeKind::Modified);
        assert_eq!(changes[0].element, "parse");
        assert_eq!(changes[1].kind, ApiChangeKind::Removed);
        assert_eq!(changes[1].element, "LEGACY_MODE");
        assert_eq!(changes[2].kind, ApiChangeKind::Added);
        assert!(!changes[2].breaking);
    }
}
