//! Persisted progress of distortion units.
//!
//! Every (mode, amplitude) unit walks through a fixed sequence of stages:
//!
//! ```text
//! PENDING_RUN → RUNNING → COMPLETE → GEOMETRY_EXTRACTED → ENERGY_PENDING
//!   → ENERGY_COMPLETE → COUPLING_PENDING → COUPLING_COMPLETE
//! ```
//!
//! `FAILED` can be entered from any stage. The current stage is written to a
//! small JSON file after every transition so an interrupted batch can tell
//! "the engine was killed mid-run" (an in-flight stage) apart from "the engine
//! finished and wrote a bad log" (a failure).
//!
//! # Status Format
//!
//! ```json
//! {
//!   "unit": "mol_dist_sing_7_+0.5",
//!   "key": "7_+0.5",
//!   "stage": "ENERGY_PENDING",
//!   "failed_at": null,
//!   "error": null,
//!   "updated": 1717171717
//! }
//! ```

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors raised while persisting or advancing unit status.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The status file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The status file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A stage change that does not move forward
    #[error("invalid transition for {unit}: {from} -> {to}")]
    InvalidTransition {
        /// Unit name
        unit: String,
        /// Stage before the attempted change
        from: UnitStage,
        /// Requested stage
        to: UnitStage,
    },
}

/// Type alias for checkpoint results
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Stage of a distortion unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStage {
    /// Block input written, engine not started
    PendingRun,
    /// Engine running on the block input
    Running,
    /// Block log verified
    Complete,
    /// Distorted geometry read from the block log
    GeometryExtracted,
    /// Excitation-energy job running
    EnergyPending,
    /// Excitation-energy log verified and filed
    EnergyComplete,
    /// Coupling job or post-processor running
    CouplingPending,
    /// Coupling output present
    CouplingComplete,
    /// Stopped by an error
    Failed,
}

impl UnitStage {
    fn rank(self) -> Option<u8> {
        match self {
            UnitStage::PendingRun => Some(0),
            UnitStage::Running => Some(1),
            UnitStage::Complete => Some(2),
            UnitStage::GeometryExtracted => Some(3),
            UnitStage::EnergyPending => Some(4),
            UnitStage::EnergyComplete => Some(5),
            UnitStage::CouplingPending => Some(6),
            UnitStage::CouplingComplete => Some(7),
            UnitStage::Failed => None,
        }
    }

    /// True for stages during which an external program is running.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            UnitStage::Running | UnitStage::EnergyPending | UnitStage::CouplingPending
        )
    }

    /// True when `self` is at or past `other` in the sequence.
    ///
    /// `FAILED` is never at or past anything.
    pub fn has_reached(self, other: UnitStage) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: UnitStage) -> bool {
        match (self.rank(), next.rank()) {
            (_, None) => self != UnitStage::Failed,
            (Some(a), Some(b)) => b > a,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for UnitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitStage::PendingRun => "PENDING_RUN",
            UnitStage::Running => "RUNNING",
            UnitStage::Complete => "COMPLETE",
            UnitStage::GeometryExtracted => "GEOMETRY_EXTRACTED",
            UnitStage::EnergyPending => "ENERGY_PENDING",
            UnitStage::EnergyComplete => "ENERGY_COMPLETE",
            UnitStage::CouplingPending => "COUPLING_PENDING",
            UnitStage::CouplingComplete => "COUPLING_COMPLETE",
            UnitStage::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Status record of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitStatus {
    /// Unit name (also the status file stem)
    pub unit: String,
    /// Distortion key text, e.g. `7_+0.5`
    pub key: String,
    /// Current stage
    pub stage: UnitStage,
    /// Stage at which the unit failed, if it did
    pub failed_at: Option<UnitStage>,
    /// Error message of the failure
    pub error: Option<String>,
    /// Unix time of the last change
    pub updated: u64,
}

impl UnitStatus {
    /// Fresh record in `PENDING_RUN`.
    pub fn new(unit: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            key: key.into(),
            stage: UnitStage::PendingRun,
            failed_at: None,
            error: None,
            updated: now(),
        }
    }

    /// Moves to `next`, which must be further along the sequence.
    pub fn advance(&mut self, next: UnitStage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(CheckpointError::InvalidTransition {
                unit: self.unit.clone(),
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        self.updated = now();
        Ok(())
    }

    /// Records a failure at the current stage.
    pub fn fail(&mut self, error: impl fmt::Display) {
        if self.stage != UnitStage::Failed {
            self.failed_at = Some(self.stage);
        }
        self.stage = UnitStage::Failed;
        self.error = Some(error.to_string());
        self.updated = now();
    }

    /// Puts a failed unit back to the start for another attempt.
    ///
    /// Completed work is not lost: stages whose logs verify are skipped on
    /// the next pass.
    pub fn restart(&mut self) {
        if self.stage == UnitStage::Failed {
            self.stage = UnitStage::PendingRun;
            self.error = None;
            self.updated = now();
        }
    }

    /// Save status to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load status from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let status: UnitStatus = serde_json::from_str(&content)?;
        Ok(status)
    }
}

/// A unit status bound to its file; every change is written through.
#[derive(Debug)]
pub struct StatusFile {
    path: PathBuf,
    status: UnitStatus,
}

impl StatusFile {
    /// Opens the record at `path`, or starts a fresh one.
    ///
    /// A record that cannot be parsed (for example one truncated by a crash
    /// mid-write) is replaced by a fresh record with a warning.
    pub fn open(path: &Path, unit: &str, key: &str) -> Result<Self> {
        let status = if path.exists() {
            match UnitStatus::load(path) {
                Ok(s) => {
                    debug!("Loaded status of {}: {}", unit, s.stage);
                    s
                }
                Err(CheckpointError::Json(e)) => {
                    warn!("Ignoring unreadable status file {}: {}", path.display(), e);
                    UnitStatus::new(unit, key)
                }
                Err(e) => return Err(e),
            }
        } else {
            UnitStatus::new(unit, key)
        };
        let file = Self {
            path: path.to_path_buf(),
            status,
        };
        file.status.save(&file.path)?;
        Ok(file)
    }

    /// Current record.
    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    /// Current stage.
    pub fn stage(&self) -> UnitStage {
        self.status.stage
    }

    /// Advances to `stage` unless the unit is already there or beyond.
    pub fn reach(&mut self, stage: UnitStage) -> Result<()> {
        if self.status.stage.has_reached(stage) {
            return Ok(());
        }
        self.status.advance(stage)?;
        debug!("{} -> {}", self.status.unit, stage);
        self.status.save(&self.path)
    }

    /// Records a failure and persists it.
    pub fn fail(&mut self, error: impl fmt::Display) -> Result<()> {
        self.status.fail(error);
        self.status.save(&self.path)
    }

    /// Resets a failed record and persists it.
    pub fn restart(&mut self) -> Result<()> {
        self.status.restart();
        self.status.save(&self.path)
    }
}
