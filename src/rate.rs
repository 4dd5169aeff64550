//! Marcus-type intersystem-crossing rate constants.
//!
//! For every singlet/triplet transition with a known coupling and a known
//! energy gap:
//!
//! ```text
//! k_ISC = (4π² / h) · ρ_FC(ΔE, λ, k_B·T) · |SOC|²
//! ρ_FC  = 1 / √(4πλ k_B T) · exp(−(ΔE + λ)² / (4λ k_B T))
//! ```
//!
//! with all energies in eV and `h` in eV·s, so `k_ISC` is in s⁻¹.

use crate::parser::{read_log, LogParser, ParseError};
use crate::states::{CouplingTable, ExcitedStates, TransitionKey, TransitionTable};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

/// Planck constant in eV·s.
pub const PLANCK_EV_S: f64 = 4.1357e-15;

/// Boltzmann constant in eV/K.
pub const BOLTZMANN_EV_K: f64 = 8.62e-5;

/// Gaps are rounded to this many decimals before use.
const GAP_DECIMALS: i32 = 4;

/// Physical parameters of the rate expression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateParameters {
    /// Reorganization energy λ in eV
    pub reorganization_energy: f64,
    /// Temperature in K
    pub temperature: f64,
}

impl Default for RateParameters {
    fn default() -> Self {
        Self {
            reorganization_energy: 0.2,
            temperature: 300.0,
        }
    }
}

impl RateParameters {
    /// k_B·T in eV.
    pub fn thermal_energy(&self) -> f64 {
        BOLTZMANN_EV_K * self.temperature
    }
}

/// Franck–Condon weighted density of states.
pub fn rho_fc(gap: f64, reorganization_energy: f64, thermal_energy: f64) -> f64 {
    let width = 4.0 * reorganization_energy * thermal_energy;
    (1.0 / (PI * width).sqrt()) * (-(gap + reorganization_energy).powi(2) / width).exp()
}

/// Rate constant for one transition; `coupling` in eV.
pub fn isc_rate(gap: f64, coupling: f64, params: &RateParameters) -> f64 {
    4.0 * PI.powi(2) / PLANCK_EV_S
        * rho_fc(gap, params.reorganization_energy, params.thermal_energy())
        * coupling.powi(2)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Energy gap `|E_S − E_T|` for every coupling key that has both energies.
///
/// Keys are normalized first (`S*`/`T*` become `S10`/`T10`). `S0` is the
/// reference and has energy 0.0 even though no record lists it. Keys missing
/// an energy are left out.
pub fn transition_gaps(couplings: &CouplingTable, states: &ExcitedStates) -> TransitionTable {
    couplings
        .iter()
        .filter_map(|(key, _)| {
            let key = key.normalized();
            let singlet = if key.singlet.is_ground_singlet() {
                Some(0.0)
            } else {
                states.singlets.get(&key.singlet).copied()
            };
            let triplet = states.triplets.get(&key.triplet).copied();
            match (singlet, triplet) {
                (Some(s), Some(t)) => Some((key, round_to((s - t).abs(), GAP_DECIMALS))),
                _ => None,
            }
        })
        .collect()
}

/// Output of a rate computation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateResult {
    /// Gaps in eV, keyed by normalized transition
    pub gaps: TransitionTable,
    /// Couplings converted to eV, keys as read
    pub couplings_ev: TransitionTable,
    /// Rate constants in s⁻¹
    pub rates: TransitionTable,
    /// Transitions dropped for lack of a gap
    pub skipped: Vec<TransitionKey>,
}

/// Computes `k_ISC` for every coupling entry.
///
/// `couplings` are in cm⁻¹ as parsed. Transitions without a gap are skipped
/// with a warning and listed in [`RateResult::skipped`]; this is never an
/// error.
pub fn isc_rates(
    couplings: &CouplingTable,
    states: &ExcitedStates,
    params: &RateParameters,
) -> RateResult {
    let couplings_ev = couplings.to_ev();
    let gaps = transition_gaps(couplings, states);
    let mut rates = TransitionTable::new();
    let mut skipped = Vec::new();

    for (key, soc) in couplings_ev.iter() {
        let key = key.normalized();
        match gaps.get(&key) {
            Some(gap) => {
                let k = isc_rate(gap, soc, params);
                debug!("{}: gap {:.4} eV, SOC {:.3e} eV, k = {:.3e} s^-1", key, gap, soc, k);
                rates.insert(key, k);
            }
            None => {
                warn!("Skipping {} due to missing delta energy", key);
                skipped.push(key);
            }
        }
    }

    RateResult {
        gaps,
        couplings_ev,
        rates,
        skipped,
    }
}

/// Everything a rate report is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateInputs {
    /// Singlets from the singlet log, triplets from the triplet log
    pub states: ExcitedStates,
    /// Couplings in cm⁻¹
    pub couplings: CouplingTable,
}

/// Reads singlet energies, triplet energies and couplings from three files.
///
/// The singlet and triplet logs may be the same file (a 50-50 calculation).
/// An empty coupling file is a [`ParseError::MissingMarker`].
pub fn load_inputs(
    parser: &dyn LogParser,
    singlet_log: &Path,
    triplet_log: &Path,
    coupling_file: &Path,
) -> Result<RateInputs, ParseError> {
    let singlets = parser.excited_states(&read_log(singlet_log)?)?.singlets;
    let triplets = if triplet_log == singlet_log {
        parser.excited_states(&read_log(singlet_log)?)?.triplets
    } else {
        parser.excited_states(&read_log(triplet_log)?)?.triplets
    };
    let couplings = parser.couplings(&read_log(coupling_file)?)?;
    if couplings.is_empty() {
        return Err(ParseError::MissingMarker(format!(
            "coupling entries in {}",
            coupling_file.display()
        )));
    }
    debug!(
        "Loaded {} singlets, {} triplets, {} couplings",
        singlets.len(),
        triplets.len(),
        couplings.len()
    );
    Ok(RateInputs {
        states: ExcitedStates { singlets, triplets },
        couplings,
    })
}
