// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Run statistics and the end-of-run summary

use std::collections::HashMap;

/// Counters accumulated over one batch pass or one watch session.
///
/// The summary printed from here is the single source of truth for how many
/// items were handled and how many failed; per-item errors never abort a run.
#[derive(Debug, Clone, Default)]
pub struct OrganizeStats {
    pub files_moved: u64,
    pub folders_moved: u64,
    pub errors: u64,
    pub skipped: u64,
    pub conflicts_resolved: u64,
    pub categories: HashMap<String, u64>,
}

impl OrganizeStats {
    /// Count one more item for a category.
    pub fn record_category(&mut self, name: &str) {
        *self.categories.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Print the human-readable summary block.
    pub fn print_summary(&self) {
        println!();
        println!("{}", "=".repeat(60));
        println!("ORGANIZATION SUMMARY");
        println!("{}", "=".repeat(60));
        println!("Files moved: {}", self.files_moved);
        println!("Folders moved: {}", self.folders_moved);
        println!("Conflicts resolved: {}", self.conflicts_resolved);
        println!("Skipped: {}", self.skipped);
        println!("Errors: {}", self.errors);

        if !self.categories.is_empty() {
            println!("\nFiles by category:");
            let mut categories: Vec<_> = self.categories.iter().collect();
            categories.sort_by_key(|&(name, _)| name);
            for (category, count) in categories {
                println!("  {}: {}", category, count);
            }
        }

        println!("{}", "=".repeat(60));
    }
}
