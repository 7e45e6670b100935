// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Extension-based classification of files and folders

use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::config::CategoryRule;

/// Category label for files that match no rule
pub const OTHER_CATEGORY: &str = "other";

/// Where a classified entry belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Category label, `"other"` when no rule matched
    pub category: String,
    /// Destination folder name, relative to the base destination
    pub destination: String,
}

/// Maps files to categories using an ordered rule table.
///
/// Rules are probed in declaration order and the first rule whose extension
/// set contains the file's extension wins, so an extension declared in two
/// categories resolves to the earlier one. Extensions are normalized once at
/// construction (leading dot stripped, lowercased).
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CategoryRule>,
    other_destination: String,
    compressed_exts: HashSet<String>,
}

impl Classifier {
    pub fn new(rules: Vec<CategoryRule>, other_destination: String) -> Self {
        let rules: Vec<CategoryRule> = rules
            .into_iter()
            .map(|mut rule| {
                rule.extensions = rule
                    .extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_lowercase())
                    .collect();
                rule
            })
            .collect();

        let compressed_exts = rules
            .iter()
            .filter(|r| r.compressed)
            .flat_map(|r| r.extensions.iter().cloned())
            .collect();

        Self {
            rules,
            other_destination,
            compressed_exts,
        }
    }

    /// Classify a file by extension. Case-insensitive; no extension or no
    /// match lands in the fallback bucket.
    pub fn classify(&self, path: &Path) -> Classification {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        for rule in &self.rules {
            if rule.extensions.iter().any(|e| *e == ext) {
                return Classification {
                    category: rule.name.clone(),
                    destination: rule.destination.clone(),
                };
            }
        }

        Classification {
            category: OTHER_CATEGORY.to_string(),
            destination: self.other_destination.clone(),
        }
    }

    /// Extensions belonging to categories flagged as compressed.
    pub fn compressed_extensions(&self) -> &HashSet<String> {
        &self.compressed_exts
    }
}

/// Whether a folder is itself a compressed artifact or contains one.
///
/// True when the folder's own name carries a compressed extension, or when a
/// recursive walk finds at least one file that does. A traversal error (e.g.
/// permission denied) stops the scan with a warning and the folder counts as
/// regular: false negatives are tolerated, false positives are not.
pub fn is_compressed_folder(path: &Path, compressed_exts: &HashSet<String>) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if compressed_exts.contains(&ext.to_lowercase()) {
            return true;
        }
    }

    match subtree_contains_extension(path, compressed_exts) {
        Ok(found) => found,
        Err(e) => {
            warn!("Could not fully check {:?}: {}", path, e);
            false
        }
    }
}

fn subtree_contains_extension(dir: &Path, exts: &HashSet<String>) -> std::io::Result<bool> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if subtree_contains_extension(&path, exts)? {
                return Ok(true);
            }
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if exts.contains(&ext.to_lowercase()) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryRule;
    use std::fs;
    use tempfile::TempDir;

    fn rule(name: &str, extensions: &[&str], destination: &str, compressed: bool) -> CategoryRule {
        CategoryRule {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            destination: destination.to_string(),
            compressed,
        }
    }

    fn classifier() -> Classifier {
        Classifier::new(
            vec![
                rule("pdf", &["pdf"], "PDF", false),
                rule("images", &["jpg", "png"], "Images", false),
                rule("compressed", &["zip", "7z"], "Compressed", true),
            ],
            "Other".to_string(),
        )
    }

    #[test]
    fn test_classify_known_extension() {
        let c = classifier().classify(Path::new("doc.pdf"));
        assert_eq!(c.category, "pdf");
        assert_eq!(c.destination, "PDF");
    }

    #[test]
    fn test_classify_case_insensitive() {
        let c = classifier();
        assert_eq!(c.classify(Path::new("a.PDF")), c.classify(Path::new("a.pdf")));
        assert_eq!(c.classify(Path::new("pic.JPG")).destination, "Images");
    }

    #[test]
    fn test_classify_unknown_extension_is_other() {
        let c = classifier().classify(Path::new("note.xyz"));
        assert_eq!(c.category, OTHER_CATEGORY);
        assert_eq!(c.destination, "Other");
    }

    #[test]
    fn test_classify_no_extension_is_other() {
        let c = classifier().classify(Path::new("README"));
        assert_eq!(c.category, OTHER_CATEGORY);
    }

    #[test]
    fn test_first_declared_category_wins() {
        let c = Classifier::new(
            vec![
                rule("scans", &["pdf"], "Scans", false),
                rule("documents", &["pdf", "txt"], "Documents", false),
            ],
            "Other".to_string(),
        );
        assert_eq!(c.classify(Path::new("a.pdf")).category, "scans");
        assert_eq!(c.classify(Path::new("a.txt")).category, "documents");
    }

    #[test]
    fn test_extensions_normalized_at_construction() {
        let c = Classifier::new(
            vec![rule("pdf", &[".PDF"], "PDF", false)],
            "Other".to_string(),
        );
        assert_eq!(c.classify(Path::new("a.pdf")).category, "pdf");
    }

    #[test]
    fn test_compressed_extensions_from_flagged_rules() {
        let c = classifier();
        assert!(c.compressed_extensions().contains("zip"));
        assert!(c.compressed_extensions().contains("7z"));
        assert!(!c.compressed_extensions().contains("pdf"));
    }

    #[test]
    fn test_compressed_folder_by_name() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("bundle.zip");
        fs::create_dir(&folder).unwrap();

        assert!(is_compressed_folder(&folder, classifier().compressed_extensions()));
    }

    #[test]
    fn test_compressed_folder_by_nested_content() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("downloads");
        fs::create_dir_all(folder.join("deep/deeper")).unwrap();
        fs::write(folder.join("deep/deeper/data.ZIP"), b"zip").unwrap();

        assert!(is_compressed_folder(&folder, classifier().compressed_extensions()));
    }

    #[test]
    fn test_regular_folder_is_not_compressed() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("photos");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("a.jpg"), b"jpg").unwrap();

        assert!(!is_compressed_folder(&folder, classifier().compressed_extensions()));
    }

    #[test]
    fn test_unreadable_folder_falls_back_to_regular() {
        let missing = Path::new("/nonexistent/folder");
        assert!(!is_compressed_folder(missing, classifier().compressed_extensions()));
    }
}
