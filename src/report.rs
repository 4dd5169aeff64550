//! Plain-text reports.
//!
//! Two kinds of output are produced:
//!
//! * the rate report (`results.out`): fixed-width sections of energies, gaps,
//!   couplings and rate constants;
//! * per-mode SOC-vs-distortion tables collected from the coupling
//!   directories of a distortion batch, one grid per singlet.
//!
//! Numbers use C-style scientific notation with a signed, two-digit exponent
//! (`3.251e+05`) so the files stay comparable with other tooling.

use crate::naming::{amplitude_from_dir_name, matching_entries, mode_from_dir_name, pattern_regex};
use crate::parser::{read_log, LogParser};
use crate::rate::{RateInputs, RateResult};
use crate::states::{StateLabel, TransitionKey};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const RULE_WIDTH: usize = 50;
const KEY_WIDTH: usize = 6;
const VALUE_WIDTH: usize = 10;

/// Errors raised while collecting or writing reports.
#[derive(Error, Debug)]
pub enum ReportError {
    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A directory pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Type alias for report results
pub type Result<T> = std::result::Result<T, ReportError>;

/// Formats `value` like C's `%.{precision}e`.
///
/// ```
/// use kisc::report::format_sci;
///
/// assert_eq!(format_sci(325060.93, 3), "3.251e+05");
/// assert_eq!(format_sci(-0.00123, 2), "-1.23e-03");
/// assert_eq!(format_sci(0.0, 3), "0.000e+00");
/// ```
pub fn format_sci(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}

/// A key that can label a report line.
pub trait ReportKey {
    /// Left-aligned label text.
    fn report_label(&self) -> String;
}

impl ReportKey for StateLabel {
    fn report_label(&self) -> String {
        format!("{:<width$}", self, width = KEY_WIDTH)
    }
}

impl ReportKey for TransitionKey {
    fn report_label(&self) -> String {
        format!(
            "{:<width$} → {:<width$}",
            self.singlet,
            self.triplet,
            width = KEY_WIDTH
        )
    }
}

/// Renders one titled section.
///
/// ```
/// use kisc::report::render_section;
/// use kisc::states::StateLabel;
///
/// let text = render_section("Singlet Energies", vec![(StateLabel::singlet(1), 2.5)]);
/// assert!(text.contains("\nS1     :  2.500e+00"));
/// assert!(text.ends_with("\n\n"));
/// ```
pub fn render_section<K, I>(title: &str, entries: I) -> String
where
    K: ReportKey,
    I: IntoIterator<Item = (K, f64)>,
{
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();
    out.push_str(&rule);
    let _ = write!(out, "\n{}:\n", title);
    out.push_str(&rule);
    for (key, value) in entries {
        let _ = write!(
            out,
            "\n{} : {:>width$}",
            key.report_label(),
            format_sci(value, 3),
            width = VALUE_WIDTH
        );
    }
    out.push_str("\n\n");
    out
}

/// The complete rate report.
///
/// Couplings and gaps are in eV, rates in s⁻¹. With `top_n > 0` a final
/// section lists the strongest couplings in cm⁻¹.
pub fn rate_report(inputs: &RateInputs, result: &RateResult, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&render_section(
        "Singlet Energies",
        inputs.states.singlets.iter().map(|(k, v)| (*k, *v)),
    ));
    out.push_str(&render_section(
        "Triplet Energies",
        inputs.states.triplets.iter().map(|(k, v)| (*k, *v)),
    ));
    out.push_str(&render_section("Delta Energies", result.gaps.iter()));
    out.push_str(&render_section("SOC Values", result.couplings_ev.iter()));
    out.push_str(&render_section(
        "Intersystem Crossing Rate Constants (k_isc)",
        result.rates.iter(),
    ));
    if top_n > 0 {
        out.push_str(&render_section(
            &format!("Top {} SOC Values (cm-1)", top_n),
            inputs.couplings.top(top_n),
        ));
    }
    out
}

/// Writes the rate report to `path`.
pub fn write_rate_report(
    path: &Path,
    inputs: &RateInputs,
    result: &RateResult,
    top_n: usize,
) -> Result<()> {
    fs::write(path, rate_report(inputs, result, top_n))?;
    info!("Results are saved in {}", path.display());
    Ok(())
}

/// Coupling values of one mode: singlet → transition → (amplitude, SOC).
pub type ModeSeries = BTreeMap<StateLabel, BTreeMap<TransitionKey, Vec<(f64, f64)>>>;

/// Collects couplings (cm⁻¹) of every coupling directory of `mode`.
///
/// Only transitions from `S1..=S{max_singlet}` are kept, with `T*` read as
/// `T10`. Directories without a readable coupling file are skipped with a
/// warning.
pub fn collect_mode_series(
    stage_dir: &Path,
    mode: u32,
    coupling_file: &str,
    max_singlet: u32,
    parser: &dyn LogParser,
) -> Result<ModeSeries> {
    let pattern = pattern_regex(&format!("*soc_dis_{}_*", mode))?;
    let mut series = ModeSeries::new();

    for dir in matching_entries(stage_dir, &pattern, true)? {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if mode_from_dir_name(&name) != Some(mode) {
            debug!("{} does not belong to mode {}, skipping", name, mode);
            continue;
        }
        let amplitude = amplitude_from_dir_name(&name);
        let path = dir.join(coupling_file);
        if !path.is_file() {
            warn!("No {} in {}, skipping", coupling_file, dir.display());
            continue;
        }
        let couplings = match read_log(&path).and_then(|text| parser.couplings(&text)) {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        for (key, value) in couplings.singlet_window(max_singlet) {
            series
                .entry(key.singlet)
                .or_default()
                .entry(key)
                .or_default()
                .push((amplitude, value));
        }
    }

    for transitions in series.values_mut() {
        for points in transitions.values_mut() {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
    }
    Ok(series)
}

/// Renders a mode's series as one amplitude grid per singlet.
///
/// Cells without a value are printed as `-`.
pub fn render_mode_table(mode: u32, series: &ModeSeries) -> String {
    let mut out = String::new();
    for (singlet, transitions) in series {
        let amplitudes: BTreeSet<u64> = transitions
            .values()
            .flatten()
            .map(|(amp, _)| amp.to_bits())
            .collect();
        let mut amplitudes: Vec<f64> = amplitudes.into_iter().map(f64::from_bits).collect();
        amplitudes.sort_by(|a, b| a.total_cmp(b));

        let _ = writeln!(
            out,
            "# Mode {}, {}: SOC (cm-1) vs distortion amplitude",
            mode, singlet
        );
        let _ = write!(out, "# {:>10}", "amplitude");
        for key in transitions.keys() {
            let _ = write!(out, " {:>12}", key.to_string());
        }
        out.push('\n');

        for amp in &amplitudes {
            let _ = write!(out, "  {:>10.4}", amp);
            for points in transitions.values() {
                let cell = points
                    .iter()
                    .find(|(a, _)| a == amp)
                    .map(|(_, v)| format_sci(*v, 4))
                    .unwrap_or_else(|| "-".to_string());
                let _ = write!(out, " {:>12}", cell);
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// File holding a mode's table: `soc_vs_distortion_mode{mode}.dat`
pub fn mode_table_name(mode: u32) -> String {
    format!("soc_vs_distortion_mode{}.dat", mode)
}

/// Collects and writes the SOC-vs-distortion table of every mode.
///
/// Modes without any coupling data produce no file. Returns the files
/// written.
pub fn write_mode_tables(
    stage_dir: &Path,
    modes: &[u32],
    coupling_file: &str,
    max_singlet: u32,
    parser: &dyn LogParser,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for &mode in modes {
        let series = collect_mode_series(stage_dir, mode, coupling_file, max_singlet, parser)?;
        if series.is_empty() {
            info!("No coupling data for mode {}", mode);
            continue;
        }
        let path = stage_dir.join(mode_table_name(mode));
        fs::write(&path, render_mode_table(mode, &series))?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GaussianLogParser;
    use crate::states::{CouplingTable, ExcitedStates};
    use tempfile::TempDir;

    fn key(s: &str, t: &str) -> TransitionKey {
        TransitionKey::new(s.parse().unwrap(), t.parse().unwrap())
    }

    #[test]
    fn test_format_sci() {
        assert_eq!(format_sci(1234.5, 3), "1.234e+03");
        assert_eq!(format_sci(1.0e-120, 3), "1.000e-120");
        assert_eq!(format_sci(9.9996, 3), "1.000e+01");
        assert_eq!(format!("{:>10}", format_sci(2.5, 3)), " 2.500e+00");
    }

    #[test]
    fn test_transition_section_layout() {
        let text = render_section("Delta Energies", vec![(key("S1", "T2"), 0.6235)]);
        let expected = format!(
            "{rule}\nDelta Energies:\n{rule}\nS1     → T2     :  6.235e-01\n\n",
            rule = "-".repeat(50)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_rate_report_sections() {
        let mut couplings = CouplingTable::new();
        couplings.insert(key("S1", "T1"), 10.0);
        let mut states = ExcitedStates::default();
        states.singlets.insert(StateLabel::singlet(1), 2.0);
        states.triplets.insert(StateLabel::triplet(1), 1.7);
        let inputs = RateInputs { states, couplings };
        let result = crate::rate::isc_rates(
            &inputs.couplings,
            &inputs.states,
            &crate::rate::RateParameters::default(),
        );

        let text = rate_report(&inputs, &result, 1);
        let titles: Vec<&str> = text
            .lines()
            .filter(|l| l.ends_with(':') && !l.starts_with('-'))
            .collect();
        assert_eq!(
            titles,
            vec![
                "Singlet Energies:",
                "Triplet Energies:",
                "Delta Energies:",
                "SOC Values:",
                "Intersystem Crossing Rate Constants (k_isc):",
                "Top 1 SOC Values (cm-1):",
            ]
        );
        assert!(text.contains("S1     → T1     :  1.000e+01"));
        assert!(text.contains("S1     → T1     :  3.000e-01"));
    }

    #[test]
    fn test_mode_tables_from_coupling_dirs() {
        let dir = TempDir::new().unwrap();
        let write = |name: &str, body: &str| {
            let d = dir.path().join(name);
            fs::create_dir_all(&d).unwrap();
            fs::write(d.join("soc_out.dat"), body).unwrap();
        };
        write(
            "soc_dis_7_+0.5",
            "<S1|Hso|T1,1>: 2.0 cm-1\n<S1|Hso|T*,1>: 4.0 cm-1\n<S7|Hso|T1,1>: 9.0 cm-1\n",
        );
        write("soc_dis_7_-0.5", "<S1|Hso|T1,1>: 1.0 cm-1\n");
        write("soc_dis_8_+0.5", "<S1|Hso|T1,1>: 5.0 cm-1\n");
        write("soc_dis_7_+1.5", "<S1|Hso|T1,1> 3.0 cm-1\n");
        fs::create_dir_all(dir.path().join("soc_dis_7_+1.0")).unwrap();

        let parser = GaussianLogParser::default();
        let series = collect_mode_series(dir.path(), 7, "soc_out.dat", 6, &parser).unwrap();
        assert_eq!(series.len(), 1);
        let s1 = &series[&StateLabel::singlet(1)];
        assert_eq!(s1[&key("S1", "T1")], vec![(-0.5, 1.0), (0.5, 2.0)]);
        assert_eq!(s1[&key("S1", "T10")], vec![(0.5, 4.0)]);

        let written = write_mode_tables(dir.path(), &[7, 9], "soc_out.dat", 6, &parser).unwrap();
        assert_eq!(written, vec![dir.path().join("soc_vs_distortion_mode7.dat")]);
        let table = fs::read_to_string(&written[0]).unwrap();
        assert!(table.starts_with("# Mode 7, S1:"));
        assert!(table.contains("     -0.5000   1.0000e+00            -"));
        assert!(table.contains("      0.5000   2.0000e+00   4.0000e+00"));
    }
}
