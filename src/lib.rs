#![warn(missing_docs)]

//! kisc - Intersystem-Crossing Workflows on Top of Gaussian
//!
//! kisc drives chains of dependent Gaussian calculations to study
//! intersystem crossing (ISC): TD-DFT excitation energies, spin-orbit
//! couplings (SOC) from an external post-processor, and Marcus-type ISC rate
//! constants.
//!
//! # Workflows
//!
//! - **Distortion batch** (`kisc distort`): a distortion tool writes Gaussian
//!   jobs displaced along selected normal modes. Every (mode, amplitude) unit
//!   is taken through block run → geometry extraction → excitation energies →
//!   SOC, with its progress persisted so an interrupted batch resumes where
//!   it stopped. Coupling values are finally tabulated against the
//!   displacement amplitude, one table per mode.
//! - **Single molecule** (`kisc molecule`): opt+freq → excitation energies →
//!   SOC → rate report.
//! - **Rates only** (`kisc rate`): `k_ISC` from existing logs.
//!
//! # Rate Expression
//!
//! For a singlet-triplet pair with energy gap ΔE and coupling ⟨H_SO⟩ (eV):
//!
//! ```text
//! ρ_FC  = 1/√(4πλkT) · exp(-(ΔE + λ)² / (4λkT))
//! k_ISC = 4π²/h · ⟨H_SO⟩² · ρ_FC
//! ```
//!
//! with reorganization energy λ and temperature T from settings.
//!
//! # Quick Start
//!
//! ```no_run
//! use kisc::pipeline::Pipeline;
//! use kisc::runner::SystemRunner;
//! use kisc::settings::SettingsManager;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SettingsManager::load(None)?;
//!     let config = manager.settings().workflow_config()?;
//!     let pipeline = Pipeline::new(config, SystemRunner);
//!     let summary = pipeline.run_distortion_batch()?;
//!     println!("{} units complete", summary.completed.len());
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`geometry`]: atoms and Cartesian geometries
//! - [`states`]: state labels, transitions and energy tables
//! - [`parser`]: Gaussian log parsing
//! - [`input`]: Gaussian input generation
//! - [`runner`]: external process execution
//! - [`naming`]: file and directory naming conventions
//! - [`checkpoint`]: persisted per-unit progress
//! - [`pipeline`]: workflow orchestration
//! - [`rate`]: Marcus ISC rates
//! - [`report`]: rate reports and SOC-vs-distortion tables
//! - [`cleanup`]: scratch file removal
//! - [`settings`]: hierarchical INI configuration
//! - [`help`]: built-in help text

pub mod checkpoint;
pub mod cleanup;
pub mod geometry;
pub mod help;
pub mod input;
pub mod naming;
pub mod parser;
pub mod pipeline;
pub mod rate;
pub mod report;
pub mod runner;
pub mod settings;
pub mod states;
