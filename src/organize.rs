// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch organization: classify entries, resolve collisions, move them

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::classify::{is_compressed_folder, Classifier};
use crate::config::AppConfig;
use crate::stats::OrganizeStats;

/// Return a collision-free variant of `desired`.
///
/// The path comes back unchanged when nothing occupies it. Otherwise
/// `stem_1.ext`, `stem_2.ext`, ... are probed in increasing order until a
/// free name is found; extensionless names become `name_1`, `name_2`, ...
/// Only existence is probed — nothing is created or locked — so the caller
/// should move into the returned path promptly.
pub fn resolve_collision(desired: &Path) -> PathBuf {
    if !desired.exists() {
        return desired.to_path_buf();
    }

    let parent = desired.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = desired
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = desired.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Orchestrates organization passes over one source directory.
///
/// Owns the statistics for its lifetime: one batch run, or one whole watch
/// session when driven event-by-event through [`Organizer::organize_file`].
pub struct Organizer {
    config: AppConfig,
    classifier: Classifier,
    stats: OrganizeStats,
    cancel: Arc<AtomicBool>,
}

impl Organizer {
    pub fn new(config: AppConfig) -> Self {
        let classifier = Classifier::new(
            config.categories.clone(),
            config.other_destination.clone(),
        );
        Self {
            config,
            classifier,
            stats: OrganizeStats::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stats(&self) -> &OrganizeStats {
        &self.stats
    }

    /// Flag checked between items; setting it stops a pass after the
    /// in-flight move completes or fails.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn should_skip(&self, path: &Path) -> bool {
        if !self.config.settings.skip_hidden_files {
            return false;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
    }

    /// Shared move plumbing for files and folders: ensure the destination
    /// directory, resolve collisions, then rename (or log in dry-run).
    fn transfer(&mut self, source: &Path, dest_dir: &Path, dry_run: bool) -> io::Result<PathBuf> {
        if self.config.settings.create_directories && !dry_run {
            fs::create_dir_all(dest_dir)?;
        }

        let name = source.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "entry has no file name")
        })?;
        let mut dest = dest_dir.join(name);

        if self.config.settings.handle_conflicts {
            let resolved = resolve_collision(&dest);
            if resolved != dest {
                self.stats.conflicts_resolved += 1;
            }
            dest = resolved;
        }

        if dry_run {
            info!("[DRY RUN] Would move: {:?} -> {:?}", name, dest);
        } else {
            info!("Moving: {:?} -> {:?}", name, dest);
            fs::rename(source, &dest)?;
            info!("Moved: {:?}", name);
        }

        Ok(dest)
    }

    /// Move one file into `dest_dir`, counting it under `category`.
    ///
    /// Every failure is captured locally: logged, counted, reported as
    /// `false`. Dry-run still resolves the final path and updates counters.
    pub fn move_file(
        &mut self,
        source: &Path,
        dest_dir: &Path,
        category: &str,
        dry_run: bool,
    ) -> bool {
        match self.transfer(source, dest_dir, dry_run) {
            Ok(_) => {
                self.stats.files_moved += 1;
                self.stats.record_category(category);
                true
            }
            Err(e) => {
                error!("Error moving {:?}: {}", source, e);
                self.stats.errors += 1;
                false
            }
        }
    }

    /// Move one folder into `dest_dir`.
    pub fn move_folder(&mut self, source: &Path, dest_dir: &Path, dry_run: bool) -> bool {
        match self.transfer(source, dest_dir, dry_run) {
            Ok(_) => {
                self.stats.folders_moved += 1;
                true
            }
            Err(e) => {
                error!("Error moving folder {:?}: {}", source, e);
                self.stats.errors += 1;
                false
            }
        }
    }

    /// Classify and move a single file, honoring the skip rules.
    ///
    /// This is the per-item operation the watch mode shares with the batch
    /// files pass.
    pub fn organize_file(&mut self, path: &Path, dry_run: bool) -> bool {
        if self.should_skip(path) {
            debug!("Skipping: {:?}", path.file_name().unwrap_or_default());
            self.stats.skipped += 1;
            return false;
        }

        let classification = self.classifier.classify(path);
        let dest_dir = self.config.base_dest().join(&classification.destination);
        self.move_file(path, &dest_dir, &classification.category, dry_run)
    }

    /// One pass over the top-level files of the source directory.
    ///
    /// The listing is taken once; entries appearing during the pass are not
    /// re-observed.
    pub fn organize_files(&mut self, dry_run: bool) {
        let source_dir = self.config.source_dir();
        if !source_dir.exists() {
            error!("Source directory does not exist: {:?}", source_dir);
            return;
        }

        info!("Starting organization of: {:?}", source_dir);
        if dry_run {
            info!("DRY RUN MODE - no files will be moved");
        }

        let entries = match snapshot(&source_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error reading {:?}: {}", source_dir, e);
                return;
            }
        };

        for path in entries.into_iter().filter(|p| p.is_file()) {
            if self.cancelled() {
                warn!("Pass interrupted; remaining files left untouched");
                return;
            }
            self.organize_file(&path, dry_run);
        }
    }

    /// One pass over the top-level folders, sorting compressed folders apart
    /// from regular ones.
    pub fn organize_folders(&mut self, dry_run: bool) {
        let source_dir = self.config.source_dir();
        if !source_dir.exists() {
            error!("Source directory does not exist: {:?}", source_dir);
            return;
        }

        let base = self.config.base_dest();
        let compressed_dest = base.join(&self.config.folders.compressed_destination);
        let regular_dest = base.join(&self.config.folders.regular_destination);

        info!("Processing folders...");

        let entries = match snapshot(&source_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error reading {:?}: {}", source_dir, e);
                return;
            }
        };

        for path in entries.into_iter().filter(|p| p.is_dir()) {
            if self.cancelled() {
                warn!("Pass interrupted; remaining folders left untouched");
                return;
            }

            if self.should_skip(&path) {
                debug!("Skipping folder: {:?}", path.file_name().unwrap_or_default());
                self.stats.skipped += 1;
                continue;
            }

            let dest = if is_compressed_folder(&path, self.classifier.compressed_extensions()) {
                &compressed_dest
            } else {
                &regular_dest
            };
            self.move_folder(&path, dest, dry_run);
        }
    }

    /// Run the full batch: files pass, then optionally the folders pass.
    pub fn run(&mut self, include_folders: bool, dry_run: bool) {
        self.organize_files(dry_run);

        if include_folders && !self.cancelled() {
            self.organize_folders(dry_run);
        }

        if !self.cancelled() {
            info!("Organization completed");
        }
    }
}

/// Take the directory listing once, up front.
fn snapshot(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        paths.push(entry?.path());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryRule;
    use std::fs;
    use tempfile::TempDir;

    fn test_config(source: &Path, dest: &Path) -> AppConfig {
        AppConfig {
            source_directory: source.to_string_lossy().into_owned(),
            base_destination: dest.to_string_lossy().into_owned(),
            categories: vec![
                CategoryRule {
                    name: "pdf".to_string(),
                    extensions: vec!["pdf".to_string()],
                    destination: "PDF".to_string(),
                    compressed: false,
                },
                CategoryRule {
                    name: "images".to_string(),
                    extensions: vec!["jpg".to_string(), "png".to_string()],
                    destination: "Images".to_string(),
                    compressed: false,
                },
                CategoryRule {
                    name: "compressed".to_string(),
                    extensions: vec!["zip".to_string()],
                    destination: "Compressed".to_string(),
                    compressed: true,
                },
            ],
            ..AppConfig::default()
        }
    }

    fn organizer(source: &Path, dest: &Path) -> Organizer {
        Organizer::new(test_config(source, dest))
    }

    #[test]
    fn test_resolve_collision_free_path_unchanged() {
        let dir = TempDir::new().unwrap();
        let desired = dir.path().join("report.pdf");
        assert_eq!(resolve_collision(&desired), desired);
    }

    #[test]
    fn test_resolve_collision_is_idempotent_until_created() {
        let dir = TempDir::new().unwrap();
        let desired = dir.path().join("report.pdf");
        fs::write(&desired, b"old").unwrap();

        let first = resolve_collision(&desired);
        let second = resolve_collision(&desired);
        assert_eq!(first, second);
        assert_eq!(first.file_name().unwrap(), "report_1.pdf");

        fs::write(&first, b"taken").unwrap();
        let third = resolve_collision(&desired);
        assert_eq!(third.file_name().unwrap(), "report_2.pdf");
    }

    #[test]
    fn test_resolve_collision_without_extension() {
        let dir = TempDir::new().unwrap();
        let desired = dir.path().join("archive");
        fs::create_dir(&desired).unwrap();

        let resolved = resolve_collision(&desired);
        assert_eq!(resolved.file_name().unwrap(), "archive_1");
    }

    #[test]
    fn test_basic_sort_scenario() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads");
        let dest = dir.path().join("storage");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("doc.pdf"), b"pdf").unwrap();
        fs::write(source.join("pic.JPG"), b"jpg").unwrap();
        fs::write(source.join("note.xyz"), b"xyz").unwrap();

        let mut org = organizer(&source, &dest);
        org.run(false, false);

        assert!(dest.join("PDF/doc.pdf").exists());
        assert!(dest.join("Images/pic.JPG").exists());
        assert!(dest.join("Other/note.xyz").exists());
        assert_eq!(fs::read_dir(&source).unwrap().count(), 0);

        let stats = org.stats();
        assert_eq!(stats.files_moved, 3);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.categories["pdf"], 1);
        assert_eq!(stats.categories["images"], 1);
        assert_eq!(stats.categories["other"], 1);
    }

    #[test]
    fn test_conflict_scenario_preserves_both_contents() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads");
        let dest = dir.path().join("storage");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(dest.join("PDF")).unwrap();
        fs::write(dest.join("PDF/report.pdf"), b"old").unwrap();
        fs::write(source.join("report.pdf"), b"new").unwrap();

        let mut org = organizer(&source, &dest);
        org.organize_files(false);

        assert_eq!(fs::read(dest.join("PDF/report.pdf")).unwrap(), b"old");
        assert_eq!(fs::read(dest.join("PDF/report_1.pdf")).unwrap(), b"new");
        assert_eq!(org.stats().conflicts_resolved, 1);
    }

    #[test]
    fn test_no_overwrite_invariant_for_repeated_names() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("storage");
        let dest_dir = dest.join("PDF");

        let mut org = organizer(dir.path(), &dest);
        for i in 0..3 {
            let staged = dir.path().join(format!("staging_{}", i));
            fs::create_dir(&staged).unwrap();
            let file = staged.join("report.pdf");
            fs::write(&file, format!("content {}", i)).unwrap();
            assert!(org.move_file(&file, &dest_dir, "pdf", false));
        }

        assert_eq!(fs::read(dest_dir.join("report.pdf")).unwrap(), b"content 0");
        assert_eq!(fs::read(dest_dir.join("report_1.pdf")).unwrap(), b"content 1");
        assert_eq!(fs::read(dest_dir.join("report_2.pdf")).unwrap(), b"content 2");
        assert_eq!(org.stats().files_moved, 3);
        assert_eq!(org.stats().conflicts_resolved, 2);
    }

    #[test]
    fn test_hidden_file_skipped() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads");
        let dest = dir.path().join("storage");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join(".DS_Store"), b"junk").unwrap();

        let mut org = organizer(&source, &dest);
        org.organize_files(false);

        assert!(source.join(".DS_Store").exists());
        assert!(!dest.exists());
        assert_eq!(org.stats().skipped, 1);
        assert_eq!(org.stats().files_moved, 0);
    }

    #[test]
    fn test_dry_run_moves_nothing_but_counts_everything() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads");
        let dest = dir.path().join("storage");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("doc.pdf"), b"pdf").unwrap();
        fs::write(source.join("pic.jpg"), b"jpg").unwrap();

        let mut org = organizer(&source, &dest);
        org.organize_files(true);

        assert!(source.join("doc.pdf").exists());
        assert!(source.join("pic.jpg").exists());
        assert!(!dest.exists());
        assert_eq!(org.stats().files_moved, 2);
        assert_eq!(org.stats().errors, 0);
    }

    #[test]
    fn test_folder_pass_separates_compressed_from_regular() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads");
        let dest = dir.path().join("storage");
        fs::create_dir_all(source.join("release")).unwrap();
        fs::write(source.join("release/build.zip"), b"zip").unwrap();
        fs::create_dir_all(source.join("photos")).unwrap();
        fs::write(source.join("photos/a.jpg"), b"jpg").unwrap();

        let mut org = organizer(&source, &dest);
        org.organize_folders(false);

        assert!(dest.join("Compressed Folders/release/build.zip").exists());
        assert!(dest.join("Folders/photos/a.jpg").exists());
        assert_eq!(org.stats().folders_moved, 2);
    }

    #[test]
    fn test_move_failure_is_counted_not_raised() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads");
        let dest = dir.path().join("storage");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("doc.pdf"), b"pdf").unwrap();
        fs::write(source.join("pic.jpg"), b"jpg").unwrap();

        let mut config = test_config(&source, &dest);
        config.settings.create_directories = false;

        let mut org = Organizer::new(config);
        org.organize_files(false);

        // Destination directories were never created, so every rename fails
        // and the pass still reaches the second file.
        assert_eq!(org.stats().errors, 2);
        assert_eq!(org.stats().files_moved, 0);
        assert!(source.join("doc.pdf").exists());
        assert!(source.join("pic.jpg").exists());
    }

    #[test]
    fn test_cancel_token_stops_pass_between_items() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads");
        let dest = dir.path().join("storage");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("doc.pdf"), b"pdf").unwrap();

        let mut org = organizer(&source, &dest);
        org.cancel_token().store(true, Ordering::Relaxed);
        org.run(false, false);

        assert!(source.join("doc.pdf").exists());
        assert_eq!(org.stats().files_moved, 0);
    }

    #[test]
    fn test_disabled_conflict_handling_overwrites() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads");
        let dest = dir.path().join("storage");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(dest.join("PDF")).unwrap();
        fs::write(dest.join("PDF/report.pdf"), b"old").unwrap();
        fs::write(source.join("report.pdf"), b"new").unwrap();

        let mut config = test_config(&source, &dest);
        config.settings.handle_conflicts = false;

        let mut org = Organizer::new(config);
        org.organize_files(false);

        assert_eq!(fs::read(dest.join("PDF/report.pdf")).unwrap(), b"new");
        assert!(!dest.join("PDF/report_1.pdf").exists());
        assert_eq!(org.stats().conflicts_resolved, 0);
    }
}
