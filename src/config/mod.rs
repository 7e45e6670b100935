// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Taxis

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Result, TaxisError};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Directory whose top-level entries get organized
    pub source_directory: String,

    /// Root directory under which category folders are created
    pub base_destination: String,

    /// Folder name for files that match no category
    #[serde(default = "default_other_destination")]
    pub other_destination: String,

    /// Category table. Declaration order is match order: the first category
    /// whose extension set contains a file's extension wins.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,

    /// Folder-pass destinations
    #[serde(default)]
    pub folders: FolderConfig,

    /// Behavior toggles
    #[serde(default)]
    pub settings: Settings,

    /// Watch-mode timing
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log sink settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One category: a set of extensions sharing a destination folder
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CategoryRule {
    pub name: String,
    pub extensions: Vec<String>,
    pub destination: String,
    /// Marks the category whose extensions count as compressed archives
    /// for the folder pass
    #[serde(default)]
    pub compressed: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FolderConfig {
    #[serde(default = "default_compressed_destination")]
    pub compressed_destination: String,
    #[serde(default = "default_regular_destination")]
    pub regular_destination: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub create_directories: bool,
    #[serde(default = "default_true")]
    pub handle_conflicts: bool,
    #[serde(default = "default_true")]
    pub skip_hidden_files: bool,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Wait after a creation event before inspecting the file
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Gap between the two size samples of the stability check
    #[serde(default = "default_stability_interval")]
    pub stability_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub log_to_console: bool,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

// Default value functions
fn default_other_destination() -> String { "Other".to_string() }
fn default_compressed_destination() -> String { "Compressed Folders".to_string() }
fn default_regular_destination() -> String { "Folders".to_string() }
fn default_true() -> bool { true }
fn default_settle_delay() -> u64 { 1000 }
fn default_stability_interval() -> u64 { 500 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_file() -> String { "taxis.log".to_string() }

fn default_categories() -> Vec<CategoryRule> {
    let rule = |name: &str, extensions: &[&str], destination: &str, compressed: bool| CategoryRule {
        name: name.to_string(),
        extensions: extensions.iter().map(|e| e.to_string()).collect(),
        destination: destination.to_string(),
        compressed,
    };

    vec![
        rule("documents", &["pdf", "doc", "docx", "txt", "rtf", "odt"], "Documents", false),
        rule("images", &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"], "Images", false),
        rule("videos", &["mp4", "mov", "mkv", "avi", "webm"], "Videos", false),
        rule("music", &["mp3", "wav", "flac", "m4a", "ogg"], "Music", false),
        rule("compressed", &["zip", "rar", "7z", "tar", "gz", "bz2"], "Compressed", true),
        rule("programs", &["exe", "msi", "dmg", "deb", "appimage"], "Programs", false),
        rule("data", &["sql", "csv", "json", "xml"], "Data", false),
    ]
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            compressed_destination: default_compressed_destination(),
            regular_destination: default_regular_destination(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            create_directories: true,
            handle_conflicts: true,
            skip_hidden_files: true,
            dry_run: false,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            stability_interval_ms: default_stability_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_to_console: true,
            log_to_file: false,
            log_file: default_log_file(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_directory: "~/Downloads".to_string(),
            base_destination: "~/Organized".to_string(),
            other_destination: default_other_destination(),
            categories: default_categories(),
            folders: FolderConfig::default(),
            settings: Settings::default(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Expand a leading `~` against `$HOME`; other paths pass through unchanged.
pub fn expand_path(path: &str) -> PathBuf {
    if path == "~" {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home);
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl AppConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing or unparseable file is fatal; run `taxis init` or
    /// `taxis config generate` to create one.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TaxisError::Config(format!(
                "Configuration file not found: {}. Run 'taxis init' to create one.",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| TaxisError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Source directory with `~` expanded
    pub fn source_dir(&self) -> PathBuf {
        expand_path(&self.source_directory)
    }

    /// Base destination with `~` expanded
    pub fn base_dest(&self) -> PathBuf {
        expand_path(&self.base_destination)
    }

    /// Extensions declared in more than one category, with the category that
    /// wins and the one that is shadowed. First declaration wins at runtime.
    pub fn duplicate_extensions(&self) -> Vec<(String, String, String)> {
        let mut seen: Vec<(String, &str)> = Vec::new();
        let mut duplicates = Vec::new();
        for rule in &self.categories {
            for ext in &rule.extensions {
                let ext = ext.trim_start_matches('.').to_lowercase();
                if let Some((_, first)) = seen.iter().find(|(e, _)| *e == ext) {
                    duplicates.push((ext.clone(), first.to_string(), rule.name.clone()));
                } else {
                    seen.push((ext, rule.name.as_str()));
                }
            }
        }
        duplicates
    }
}
