// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Taxis: Rule-Driven Download Organizer
//!
//! Moves files from a source directory into category folders based on their
//! extension, either as a one-shot batch pass or continuously as files
//! appear.

use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taxis::config::{AppConfig, LoggingConfig};
use taxis::organize::Organizer;
use taxis::watcher::{is_stable, should_process, FileWatcher, ProcessingSet, WatchEvent};
use taxis::{Result, TaxisError};

/// Taxis CLI - Rule-Driven Download Organizer
#[derive(Parser, Debug)]
#[command(name = "taxis")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Rule-driven download organizer", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one organization pass over the source directory
    Organize {
        /// Also sort top-level folders (compressed vs regular)
        #[arg(short, long)]
        folders: bool,

        /// Show what would be moved without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Watch the source directory and organize files as they appear
    Watch {
        /// Directory to watch (overrides config)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Dry run mode (don't actually move files)
        #[arg(long)]
        dry_run: bool,

        /// Organize files already present on startup
        #[arg(long)]
        process_existing: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Initialize a new Taxis setup
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let command = cli.command.take().unwrap_or(Commands::Organize {
        folders: false,
        dry_run: false,
    });

    match command {
        Commands::Organize { folders, dry_run } => {
            let config = AppConfig::load(&cli.config)?;
            let _log_guard = init_logging(&cli, &config.logging)?;
            run_organize(config, folders, dry_run).await
        }
        Commands::Watch {
            dir,
            dry_run,
            process_existing,
        } => {
            let config = AppConfig::load(&cli.config)?;
            let _log_guard = init_logging(&cli, &config.logging)?;
            run_watch(config, dir, dry_run, process_existing).await
        }
        Commands::Config { action } => run_config_command(action, &cli),
        Commands::Init { dir, force } => run_init(dir, force),
    }
}

/// Initialize tracing: console layer plus an optional file layer.
///
/// CLI flags override the configured level; the file layer writes through a
/// non-blocking appender whose guard must outlive the run.
fn init_logging(cli: &Cli, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        config.level.as_str()
    };

    let filter = EnvFilter::try_new(level)
        .map_err(|e| TaxisError::Config(format!("Invalid log level '{}': {}", level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.log_to_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

        if config.log_to_console {
            registry
                .with(file_layer)
                .with(fmt::layer().with_target(false))
                .init();
        } else {
            registry.with(file_layer).init();
        }
        Ok(Some(guard))
    } else if config.log_to_console {
        registry.with(fmt::layer().with_target(false)).init();
        Ok(None)
    } else {
        registry.init();
        Ok(None)
    }
}

/// Run one batch pass, keeping the summary reachable across an interrupt.
async fn run_organize(config: AppConfig, include_folders: bool, dry_run: bool) -> Result<()> {
    let dry_run = dry_run || config.settings.dry_run;

    let organizer = Arc::new(Mutex::new(Organizer::new(config)));
    let cancel = organizer
        .lock()
        .expect("organizer lock poisoned")
        .cancel_token();

    // The pass is blocking filesystem work; run it off the async thread so
    // Ctrl+C can still be observed between items.
    let worker = Arc::clone(&organizer);
    let mut pass = tokio::task::spawn_blocking(move || {
        worker
            .lock()
            .expect("organizer lock poisoned")
            .run(include_folders, dry_run);
    });

    tokio::select! {
        res = &mut pass => {
            if let Err(e) = res {
                error!("Organization pass failed: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            warn!("Operation cancelled by user");
            cancel.store(true, Ordering::Relaxed);
            let _ = (&mut pass).await;
        }
    }

    organizer
        .lock()
        .expect("organizer lock poisoned")
        .stats()
        .print_summary();

    Ok(())
}

/// Run the watch mode (main organizing loop)
async fn run_watch(
    mut config: AppConfig,
    dir_override: Option<PathBuf>,
    dry_run: bool,
    process_existing: bool,
) -> Result<()> {
    if let Some(dir) = dir_override {
        config.source_directory = dir.to_string_lossy().into_owned();
    }
    let dry_run = dry_run || config.settings.dry_run;

    let source_dir = config.source_dir();
    if !source_dir.exists() {
        return Err(TaxisError::Config(format!(
            "Source directory does not exist: {}",
            source_dir.display()
        )));
    }

    if dry_run {
        warn!("DRY RUN MODE - files will not be moved");
    }

    let settle_delay = Duration::from_millis(config.watch.settle_delay_ms);
    let stability_interval = Duration::from_millis(config.watch.stability_interval_ms);
    let base_destination = config.base_dest();

    let organizer = Arc::new(Mutex::new(Organizer::new(config)));
    let processing = ProcessingSet::new();

    // Setup file watcher
    let mut watcher = FileWatcher::new()?;
    watcher.watch(&source_dir)?;

    // Process existing files if requested
    if process_existing {
        info!("Processing existing files...");
        let worker = Arc::clone(&organizer);
        let startup = tokio::task::spawn_blocking(move || {
            worker
                .lock()
                .expect("organizer lock poisoned")
                .organize_files(dry_run);
        });
        if let Err(e) = startup.await {
            error!("Startup pass failed: {}", e);
        }
    }

    // Setup graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = terminate => info!("Received SIGTERM, shutting down..."),
        }

        let _ = shutdown_tx.send(true);
    });

    info!(
        "Watcher active since {}. Press Ctrl+C to stop.",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("Monitoring: {:?}", source_dir);
    info!("Destination: {:?}", base_destination);

    // Main event loop
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        if let Some(event) = watcher.next_event(Duration::from_millis(100)) {
            match event {
                WatchEvent::FileCreated(path) => {
                    if !should_process(&path) {
                        continue;
                    }
                    let organizer = Arc::clone(&organizer);
                    let processing = processing.clone();

                    tokio::spawn(async move {
                        // Give an in-progress download a moment to finish
                        // writing before the file is inspected.
                        tokio::time::sleep(settle_delay).await;

                        let Some(_claim) = processing.claim(&path) else {
                            return;
                        };
                        info!(
                            "New file detected: {:?}",
                            path.file_name().unwrap_or_default()
                        );
                        organize_one(&organizer, &path, dry_run);
                    });
                }
                WatchEvent::FileModified(path) => {
                    if !should_process(&path) {
                        continue;
                    }
                    let organizer = Arc::clone(&organizer);
                    let processing = processing.clone();

                    tokio::spawn(async move {
                        if !path.exists() {
                            return;
                        }
                        if !is_stable(&path, stability_interval).await {
                            debug!(
                                "File still being written: {:?}",
                                path.file_name().unwrap_or_default()
                            );
                            return;
                        }

                        let Some(_claim) = processing.claim(&path) else {
                            return;
                        };
                        debug!(
                            "File completed: {:?}",
                            path.file_name().unwrap_or_default()
                        );
                        organize_one(&organizer, &path, dry_run);
                    });
                }
                WatchEvent::Error(e) => {
                    warn!("Watch error: {}", e);
                }
            }
        }
    }

    info!("Watcher stopped.");
    organizer
        .lock()
        .expect("organizer lock poisoned")
        .stats()
        .print_summary();

    Ok(())
}

/// Organize a single watched file; per-item failures stay local so the
/// subscription is never torn down.
fn organize_one(organizer: &Arc<Mutex<Organizer>>, path: &Path, dry_run: bool) {
    if !path.exists() {
        warn!(
            "File no longer exists: {:?}",
            path.file_name().unwrap_or_default()
        );
        return;
    }

    let mut org = organizer.lock().expect("organizer lock poisoned");
    if org.organize_file(path, dry_run) {
        info!("Organized: {:?}", path.file_name().unwrap_or_default());
    } else {
        warn!(
            "Failed to organize: {:?}",
            path.file_name().unwrap_or_default()
        );
    }
}

/// Run config commands
fn run_config_command(action: ConfigCommands, cli: &Cli) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let config = AppConfig::load(&cli.config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            let default_config = AppConfig::default();
            default_config.save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            let config = AppConfig::load(&cli.config)?;
            println!("Configuration at {:?} is valid", cli.config);
            println!("  Source: {:?}", config.source_dir());
            println!("  Destination: {:?}", config.base_dest());
            println!("  Categories: {}", config.categories.len());
            for (ext, winner, shadowed) in config.duplicate_extensions() {
                println!(
                    "  note: extension '{}' in '{}' is shadowed by '{}'",
                    ext, shadowed, winner
                );
            }
        }
    }

    Ok(())
}

/// Initialize a new Taxis setup
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(TaxisError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    std::fs::create_dir_all(&target)?;
    let config = AppConfig::default();
    config.save(&config_path)?;

    println!("Taxis initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("\nNext steps:");
    println!("  1. Edit config.json (source_directory, base_destination)");
    println!("  2. Preview a pass: taxis organize --dry-run");
    println!("  3. Or start watching: taxis watch");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["taxis"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_organize_command() {
        let cli = Cli::try_parse_from(["taxis", "organize", "--folders", "--dry-run"]).unwrap();

        match cli.command {
            Some(Commands::Organize { folders, dry_run }) => {
                assert!(folders);
                assert!(dry_run);
            }
            _ => panic!("Expected Organize command"),
        }
    }

    #[test]
    fn test_cli_watch_command() {
        let cli = Cli::try_parse_from(["taxis", "watch", "--dry-run", "--dir", "/tmp/test"])
            .unwrap();

        match cli.command {
            Some(Commands::Watch { dry_run, dir, .. }) => {
                assert!(dry_run);
                assert_eq!(dir, Some(PathBuf::from("/tmp/test")));
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_cli_config_override() {
        let cli = Cli::try_parse_from(["taxis", "--config", "/etc/taxis.json", "organize"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/taxis.json"));
    }
}
