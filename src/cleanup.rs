//! Removal of bulky engine scratch files from coupling directories.
//!
//! The coupling post-processor needs the engine's read-write file
//! (`gaussian.rwf`) and checkpoint (`gaussian.chk`) while it runs. Afterwards
//! they are dead weight, often gigabytes per unit, and a distortion batch
//! creates one coupling directory per (mode, amplitude).
//!
//! # What Gets Deleted
//!
//! Only files whose names appear in the configured scratch list, and only
//! inside directories matching the coupling-directory pattern. Inputs, logs
//! and the post-processor's output are never touched.
//!
//! # Configuration
//!
//! ```ini
//! [cleanup]
//! # Enable or disable cleanup (default: true)
//! enabled = true
//!
//! # Clean each coupling directory right after its post-processor finishes
//! after_coupling = false
//!
//! # Scratch files to remove (comma-separated)
//! scratch_files = gaussian.chk, gaussian.rwf
//!
//! # Which stage subdirectories hold coupling jobs
//! dir_pattern = *soc_dis*
//!
//! # 0 = quiet, 1 = normal, 2 = verbose
//! verbose = 1
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use kisc::cleanup::{CleanupConfig, CleanupManager};
//! use std::path::Path;
//!
//! let manager = CleanupManager::new(CleanupConfig::default());
//! let summary = manager.cleanup_stage(Path::new("singlets")).unwrap();
//! println!("removed {} files", summary.removed.len());
//! ```

use crate::naming::{matching_entries, pattern_regex};
use crate::settings::Settings;
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during cleanup operations.
#[derive(Error, Debug)]
pub enum CleanupError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid path error
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The directory pattern is not usable
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for cleanup operations
pub type Result<T> = std::result::Result<T, CleanupError>;

/// Configuration for cleanup operations.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupConfig {
    /// Enable cleanup
    pub enabled: bool,

    /// Exact file names treated as scratch
    pub scratch_files: Vec<String>,

    /// Pattern selecting coupling directories inside a stage directory
    pub dir_pattern: String,

    /// Verbosity level for cleanup logging
    pub verbose: u32,

    /// Global print level from logging settings (0=quiet, 1=normal, 2=verbose)
    pub print_level: u32,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scratch_files: vec!["gaussian.chk".to_string(), "gaussian.rwf".to_string()],
            dir_pattern: "*soc_dis*".to_string(),
            verbose: 1,
            print_level: 1,
        }
    }
}

impl CleanupConfig {
    /// Builds the cleanup configuration from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let config = CleanupConfig {
            enabled: settings.cleanup.enabled,
            scratch_files: settings.cleanup.scratch_files.clone(),
            dir_pattern: settings.cleanup.dir_pattern.clone(),
            verbose: settings.cleanup.verbose,
            print_level: settings.logging.print_level,
        };

        if config.verbose >= 2 {
            info!("Cleanup configuration:");
            info!("  Enabled: {}", config.enabled);
            info!("  Scratch files: {:?}", config.scratch_files);
            info!("  Directory pattern: {}", config.dir_pattern);
        }

        config
    }

    /// Checks if cleanup is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Checks if logging should occur based on print_level and verbose settings.
    ///
    /// - print_level 0 (quiet) suppresses all cleanup messages
    /// - print_level 1 (normal) defers to `verbose`
    /// - print_level 2 (verbose) prints everything
    pub fn should_log(&self, min_verbose_level: u32) -> bool {
        if self.print_level == 0 {
            return false;
        }

        if self.print_level >= 2 {
            return true;
        }

        self.verbose >= min_verbose_level
    }
}

/// What a cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupSummary {
    /// Files deleted
    pub removed: Vec<PathBuf>,
    /// Total size of deleted files in bytes
    pub bytes_freed: u64,
    /// Files that could not be deleted
    pub errors: usize,
}

impl CleanupSummary {
    fn absorb(&mut self, other: CleanupSummary) {
        self.removed.extend(other.removed);
        self.bytes_freed += other.bytes_freed;
        self.errors += other.errors;
    }
}

/// Removes scratch files from coupling directories.
pub struct CleanupManager {
    /// Cleanup configuration
    config: CleanupConfig,
}

impl CleanupManager {
    /// Creates a new cleanup manager.
    pub fn new(config: CleanupConfig) -> Self {
        Self { config }
    }

    /// True when `filename` is on the scratch list.
    pub fn is_scratch(&self, filename: &str) -> bool {
        self.config.scratch_files.iter().any(|s| s == filename)
    }

    /// Deletes the scratch files of a single directory.
    ///
    /// A missing directory is not an error. Files that fail to delete are
    /// logged and counted; the pass continues.
    pub fn cleanup_directory(&self, directory: &Path) -> Result<CleanupSummary> {
        let mut summary = CleanupSummary::default();

        if !self.config.is_enabled() {
            if self.config.should_log(1) {
                info!(
                    "Cleanup is disabled, skipping directory: {}",
                    directory.display()
                );
            }
            return Ok(summary);
        }

        if !directory.exists() {
            if self.config.should_log(2) {
                debug!(
                    "Directory does not exist, skipping: {}",
                    directory.display()
                );
            }
            return Ok(summary);
        }

        if !directory.is_dir() {
            return Err(CleanupError::InvalidPath(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        for entry in fs::read_dir(directory)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("")
                .to_string();
            if path.is_dir() || !self.is_scratch(&filename) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path) {
                Ok(_) => {
                    if self.config.should_log(1) {
                        info!("Cleaned up file: {}", path.display());
                    }
                    summary.bytes_freed += size;
                    summary.removed.push(path);
                }
                Err(e) => {
                    warn!("Failed to remove file {}: {}", path.display(), e);
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Deletes scratch files in every coupling directory under `stage_dir`.
    pub fn cleanup_stage(&self, stage_dir: &Path) -> Result<CleanupSummary> {
        let pattern = pattern_regex(&self.config.dir_pattern)?;
        let mut summary = CleanupSummary::default();

        for dir in matching_entries(stage_dir, &pattern, true)? {
            summary.absorb(self.cleanup_directory(&dir)?);
        }

        if self.config.should_log(1) {
            info!(
                "Cleanup completed: {} files deleted, {:.1} MB freed",
                summary.removed.len(),
                summary.bytes_freed as f64 / 1_048_576.0
            );
        }
        if summary.errors > 0 {
            error!("Cleanup completed with {} errors", summary.errors);
        }

        Ok(summary)
    }

    /// Gets the cleanup configuration (read-only).
    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }
}
