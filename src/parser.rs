//! Parsing of the engine's free-text output.
//!
//! Everything this crate knows about a finished calculation is re-derived
//! from text files on disk: orientation tables, "Excited State" lines, the
//! coupling post-processor's `<bra|H|ket>` lines and the distortion tool's
//! combined job file. The engine's output layout is an external contract we
//! do not own, so all knowledge of it lives behind the [`LogParser`] trait.
//! A new engine version with a different layout gets its own implementation.
//!
//! # Formats
//!
//! Orientation table (the last one in a log is the final geometry):
//!
//! ```text
//!                          Standard orientation:
//!  ---------------------------------------------------------------------
//!  Center     Atomic      Atomic             Coordinates (Angstroms)
//!  Number     Number       Type             X           Y           Z
//!  ---------------------------------------------------------------------
//!       1          6           0        0.000000    0.000000    0.000000
//!  ---------------------------------------------------------------------
//! ```
//!
//! Excited state record:
//!
//! ```text
//!  Excited State   1:      Singlet-A      3.9741 eV  311.98 nm  f=0.0012
//! ```
//!
//! Coupling record:
//!
//! ```text
//! <S1|Hso|T2,1>: 12.3456 cm-1
//! ```

use crate::geometry::{Atom, Geometry};
use crate::states::{CouplingTable, ExcitedStates, StateLabel, TransitionKey};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Marker line preceding every orientation table.
pub const ORIENTATION_MARKER: &str = "Standard orientation";
/// Lines from the marker to the first atom record.
pub const ORIENTATION_HEADER_LINES: usize = 5;
/// Separator closing an orientation table.
pub const TABLE_SEPARATOR: &str = "-----";
/// Phrase printed by the distortion tool in front of each distorted job.
pub const DISTORTION_MARKER: &str = "Distortion along normal mode";
/// Job separator in multi-job engine inputs.
pub const LINK_MARKER: &str = "--Link1--";
/// Lines between the start of a distorted job and its distortion header.
pub const DISTORTION_BLOCK_LEAD: usize = 4;
/// Gaussian's normal termination phrase.
pub const GAUSSIAN_NORMAL_TERMINATION: &str = "Normal termination of Gaussian";

lazy_static! {
    // "Distortion along normal mode N 7 by +0.50"
    static ref DISTORTION_RE: Regex =
        Regex::new(r"Distortion along normal mode N\s*(\d+)\s+by\s+([+-])\s*([\d.]+)").unwrap();
}

/// Errors raised while reading engine output.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The log file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed to open or read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// An expected section marker is absent
    #[error("missing marker: {0}")]
    MissingMarker(String),
    /// A line is present but does not have the expected shape
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number in the parsed text
        line: usize,
        /// What was wrong with the line
        reason: String,
    },
}

/// Type alias for parser results
pub type Result<T> = std::result::Result<T, ParseError>;

fn malformed(index: usize, reason: impl Into<String>) -> ParseError {
    ParseError::MalformedRecord {
        line: index + 1,
        reason: reason.into(),
    }
}

/// Reads a whole log into memory.
pub fn read_log(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Direction of a normal-mode displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sign {
    /// `+`
    Plus,
    /// `-`
    Minus,
}

impl Sign {
    fn as_char(self) -> char {
        match self {
            Sign::Plus => '+',
            Sign::Minus => '-',
        }
    }
}

/// Identifies one distorted geometry: normal mode and signed amplitude.
///
/// The text form is `"{mode}_{sign}{amplitude}"`, e.g. `7_+0.5`. The
/// amplitude is kept exactly as printed so names derived from the key match
/// the tool's output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DistortionKey {
    /// 1-based normal-mode index
    pub mode: u32,
    /// Displacement direction
    pub sign: Sign,
    /// Unsigned amplitude text as printed by the tool
    pub amplitude: String,
}

impl DistortionKey {
    /// Builds a key, validating the amplitude text.
    pub fn new(mode: u32, sign: Sign, amplitude: &str) -> std::result::Result<Self, String> {
        amplitude
            .parse::<f64>()
            .map_err(|_| format!("invalid amplitude '{}'", amplitude))?;
        Ok(Self {
            mode,
            sign,
            amplitude: amplitude.to_string(),
        })
    }

    /// Signed amplitude text, e.g. `+0.5`.
    pub fn signed_amplitude_text(&self) -> String {
        format!("{}{}", self.sign.as_char(), self.amplitude)
    }

    /// Signed amplitude as a number.
    pub fn signed_amplitude(&self) -> f64 {
        let magnitude: f64 = self.amplitude.parse().unwrap_or(0.0);
        match self.sign {
            Sign::Plus => magnitude,
            Sign::Minus => -magnitude,
        }
    }

    fn from_captures(caps: &regex::Captures<'_>) -> std::result::Result<Self, String> {
        let mode: u32 = caps[1]
            .parse()
            .map_err(|_| format!("invalid mode index '{}'", &caps[1]))?;
        let sign = if &caps[2] == "+" { Sign::Plus } else { Sign::Minus };
        Self::new(mode, sign, &caps[3])
    }
}

impl fmt::Display for DistortionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.mode, self.signed_amplitude_text())
    }
}

impl FromStr for DistortionKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (mode, amp) = s
            .split_once('_')
            .ok_or_else(|| format!("invalid distortion key '{}'", s))?;
        let mode: u32 = mode
            .parse()
            .map_err(|_| format!("invalid mode in key '{}'", s))?;
        let sign = match amp.chars().next() {
            Some('+') => Sign::Plus,
            Some('-') => Sign::Minus,
            _ => return Err(format!("missing sign in key '{}'", s)),
        };
        Self::new(mode, sign, &amp[1..])
    }
}

/// A distorted geometry together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionRecord {
    /// Mode and amplitude
    pub key: DistortionKey,
    /// Geometry following the distortion header
    pub geometry: Geometry,
}

/// One job cut out of the distortion tool's combined input.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionBlock {
    /// Mode and amplitude named in the block's header
    pub key: DistortionKey,
    /// Complete engine input for this job, terminated by a blank line
    pub content: String,
}

/// Engine-output parser.
///
/// One implementation exists per engine output format, so format drift is a
/// localized change.
pub trait LogParser {
    /// Final geometry of a log (last orientation table).
    fn geometry(&self, text: &str) -> Result<Geometry>;

    /// Excitation energies numbered per multiplicity in file order.
    fn excited_states(&self, text: &str) -> Result<ExcitedStates>;

    /// Coupling matrix elements from the post-processor's output.
    fn couplings(&self, text: &str) -> Result<CouplingTable>;

    /// Every distortion header with the geometry that follows it.
    fn distortions(&self, text: &str) -> Result<Vec<DistortionRecord>>;

    /// Whether a line is the engine's normal-termination line.
    fn is_normal_termination(&self, line: &str) -> bool;
}

/// Parser for Gaussian 09/16 logs.
#[derive(Debug, Clone)]
pub struct GaussianLogParser {
    /// Phrase expected on the last non-empty line of a successful log
    pub termination_phrase: String,
}

impl Default for GaussianLogParser {
    fn default() -> Self {
        Self {
            termination_phrase: GAUSSIAN_NORMAL_TERMINATION.to_string(),
        }
    }
}

impl GaussianLogParser {
    /// Parser with a custom termination phrase.
    pub fn new(termination_phrase: impl Into<String>) -> Self {
        Self {
            termination_phrase: termination_phrase.into(),
        }
    }
}

/// Reads the orientation table whose marker sits at `marker_idx`.
fn read_orientation_table(lines: &[&str], marker_idx: usize) -> Result<Geometry> {
    let start = marker_idx + ORIENTATION_HEADER_LINES;
    let mut atoms = Vec::new();

    for (idx, line) in lines.iter().enumerate().skip(start) {
        if line.contains(TABLE_SEPARATOR) {
            if atoms.is_empty() {
                return Err(malformed(idx, "orientation table has no atom records"));
            }
            return Ok(Geometry::new(atoms));
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            return Err(malformed(
                idx,
                format!("expected at least 6 columns, found {}", parts.len()),
            ));
        }
        let number: i32 = parts[1]
            .parse()
            .map_err(|_| malformed(idx, format!("invalid atomic number '{}'", parts[1])))?;
        let mut xyz = [0.0_f64; 3];
        for (slot, token) in xyz.iter_mut().zip(&parts[3..6]) {
            *slot = token
                .parse()
                .map_err(|_| malformed(idx, format!("invalid coordinate '{}'", token)))?;
        }
        atoms.push(Atom::from_atomic_number(number, xyz[0], xyz[1], xyz[2]));
    }

    Err(malformed(
        lines.len().saturating_sub(1),
        "orientation table is not terminated",
    ))
}

fn marker_indices(lines: &[&str], marker: &str) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.contains(marker))
        .map(|(i, _)| i)
        .collect()
}

impl LogParser for GaussianLogParser {
    fn geometry(&self, text: &str) -> Result<Geometry> {
        let lines: Vec<&str> = text.lines().collect();
        let last = marker_indices(&lines, ORIENTATION_MARKER)
            .pop()
            .ok_or_else(|| ParseError::MissingMarker(ORIENTATION_MARKER.to_string()))?;
        read_orientation_table(&lines, last)
    }

    fn excited_states(&self, text: &str) -> Result<ExcitedStates> {
        let mut states = ExcitedStates::default();
        let mut n_singlet = 0;
        let mut n_triplet = 0;

        for (idx, line) in text.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let is_record = ["Excited", "State", "eV"]
                .iter()
                .all(|needle| tokens.contains(needle));
            if !is_record || tokens.len() < 5 {
                continue;
            }

            let multiplicity = tokens[3];
            let singlet = multiplicity.starts_with("Singlet");
            if !singlet && !multiplicity.starts_with("Triplet") {
                continue;
            }
            let energy: f64 = tokens[4]
                .parse()
                .map_err(|_| malformed(idx, format!("invalid excitation energy '{}'", tokens[4])))?;

            if singlet {
                n_singlet += 1;
                states.singlets.insert(StateLabel::singlet(n_singlet), energy);
            } else {
                n_triplet += 1;
                states.triplets.insert(StateLabel::triplet(n_triplet), energy);
            }
        }

        Ok(states)
    }

    fn couplings(&self, text: &str) -> Result<CouplingTable> {
        let mut table = CouplingTable::new();

        for (idx, line) in text.lines().enumerate() {
            let Some(open) = line.find('<') else {
                continue;
            };
            let close = line[open..]
                .find('>')
                .map(|c| open + c)
                .ok_or_else(|| malformed(idx, "missing '>' delimiter"))?;
            let fields: Vec<&str> = line[open + 1..close].split('|').collect();
            if fields.len() < 3 {
                return Err(malformed(idx, "expected <bra|H|ket> with three fields"));
            }
            let bra = fields[0].trim();
            let ket = fields[2].split(',').next().unwrap_or("").trim();
            let singlet: StateLabel = bra
                .parse()
                .map_err(|e: crate::states::LabelError| malformed(idx, e.to_string()))?;
            let triplet: StateLabel = ket
                .parse()
                .map_err(|e: crate::states::LabelError| malformed(idx, e.to_string()))?;

            let colon = line[close..]
                .find(':')
                .map(|c| close + c)
                .ok_or_else(|| malformed(idx, "missing ':' delimiter"))?;
            let value_token = line[colon + 1..]
                .split_whitespace()
                .next()
                .ok_or_else(|| malformed(idx, "missing coupling value"))?;
            let value: f64 = value_token
                .parse()
                .map_err(|_| malformed(idx, format!("invalid coupling value '{}'", value_token)))?;

            table.insert(TransitionKey::new(singlet, triplet), value);
        }

        Ok(table)
    }

    fn distortions(&self, text: &str) -> Result<Vec<DistortionRecord>> {
        let lines: Vec<&str> = text.lines().collect();
        let headers = marker_indices(&lines, DISTORTION_MARKER);
        if headers.is_empty() {
            return Err(ParseError::MissingMarker(DISTORTION_MARKER.to_string()));
        }
        let orientations = marker_indices(&lines, ORIENTATION_MARKER);
        if orientations.is_empty() {
            return Err(ParseError::MissingMarker(ORIENTATION_MARKER.to_string()));
        }

        let mut records = Vec::new();
        for header in headers {
            let Some(caps) = DISTORTION_RE.captures(lines[header]) else {
                log::debug!("Skipping unrecognised distortion header at line {}", header + 1);
                continue;
            };
            let key = DistortionKey::from_captures(&caps).map_err(|e| malformed(header, e))?;
            let orientation = orientations
                .iter()
                .copied()
                .find(|&i| i > header)
                .ok_or_else(|| {
                    ParseError::MissingMarker(format!("{} after distortion {}", ORIENTATION_MARKER, key))
                })?;
            let geometry = read_orientation_table(&lines, orientation)?;
            records.push(DistortionRecord { key, geometry });
        }

        if records.is_empty() {
            return Err(ParseError::MissingMarker(format!(
                "{} N <mode> by <sign><amplitude>",
                DISTORTION_MARKER
            )));
        }
        Ok(records)
    }

    fn is_normal_termination(&self, line: &str) -> bool {
        line.contains(&self.termination_phrase)
    }
}

/// Splits the distortion tool's combined job file into one job per
/// distortion of `mode`.
///
/// A block starts [`DISTORTION_BLOCK_LEAD`] lines before its distortion
/// header and runs up to the next [`LINK_MARKER`] or the end of the file.
/// Trailing blank lines are normalised to the single blank line the engine
/// needs after the last input section.
pub fn split_distortion_blocks(text: &str, mode: u32) -> Result<Vec<DistortionBlock>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut open: Option<(usize, DistortionKey)> = None;

    let close = |start: usize, end: usize, key: DistortionKey, blocks: &mut Vec<DistortionBlock>| {
        let mut body: Vec<&str> = lines[start..end].to_vec();
        while body.last().map_or(false, |l| l.trim().is_empty()) {
            body.pop();
        }
        let mut content = body.join("\n");
        content.push_str("\n\n");
        blocks.push(DistortionBlock { key, content });
    };

    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = DISTORTION_RE.captures(line) {
            let key = DistortionKey::from_captures(&caps).map_err(|e| malformed(idx, e))?;
            if key.mode == mode {
                open = Some((idx.saturating_sub(DISTORTION_BLOCK_LEAD), key));
            }
        } else if line.contains(LINK_MARKER) {
            if let Some((start, key)) = open.take() {
                close(start, idx, key, &mut blocks);
            }
        }
    }
    if let Some((start, key)) = open.take() {
        close(start, lines.len(), key, &mut blocks);
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orientation(rows: &[(i32, f64, f64, f64)]) -> String {
        let mut s = String::from(
            "                         Standard orientation:\n \
             ---------------------------------------------------------------------\n \
             Center     Atomic      Atomic             Coordinates (Angstroms)\n \
             Number     Number       Type             X           Y           Z\n \
             ---------------------------------------------------------------------\n",
        );
        for (i, (z, x, y, zc)) in rows.iter().enumerate() {
            s.push_str(&format!(
                "      {:>2}          {:>2}           0    {:>12.6}{:>12.6}{:>12.6}\n",
                i + 1,
                z,
                x,
                y,
                zc
            ));
        }
        s.push_str(" ---------------------------------------------------------------------\n");
        s
    }

    #[test]
    fn test_geometry_uses_last_orientation() {
        let text = format!(
            "{}\n Rotational constants\n{}\n Normal termination of Gaussian 16\n",
            orientation(&[(6, 0.0, 0.0, 0.0), (8, 0.0, 0.0, 1.2)]),
            orientation(&[(6, 0.0, 0.0, 0.1), (8, 0.0, 0.0, 1.3), (1, 0.9, 0.0, -0.4)])
        );
        let geom = GaussianLogParser::default().geometry(&text).unwrap();
        assert_eq!(geom.num_atoms(), 3);
        assert_eq!(geom.symbols(), vec!["C", "O", "H"]);
        assert!((geom.atoms[1].position.z - 1.3).abs() < 1e-9);
        assert!((geom.atoms[2].position.x - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_geometry_unknown_atomic_number() {
        let text = orientation(&[(0, 1.0, 2.0, 3.0), (-1, 0.0, 0.0, 1.0), (6, 0.0, 0.0, 0.0)]);
        let geom = GaussianLogParser::default().geometry(&text).unwrap();
        assert_eq!(geom.symbols(), vec!["0", "-1", "C"]);
    }

    #[test]
    fn test_geometry_missing_marker() {
        let err = GaussianLogParser::default()
            .geometry("SCF Done\nNormal termination of Gaussian\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingMarker(_)));
    }

    #[test]
    fn test_geometry_short_record_is_malformed() {
        let header: String = orientation(&[])
            .lines()
            .take(ORIENTATION_HEADER_LINES)
            .map(|l| format!("{}\n", l))
            .collect();
        let text = format!(
            "{}      1          6    0.000000    0.000000\n {}\n",
            header, "-".repeat(69)
        );
        let err = GaussianLogParser::default().geometry(&text).unwrap_err();
        assert!(matches!(err, ParseError::MalformedRecord { .. }));
    }

    #[test]
    fn test_geometry_truncated_table_is_malformed() {
        let full = orientation(&[(6, 0.0, 0.0, 0.0)]);
        let truncated: String = full.lines().take(6).map(|l| format!("{}\n", l)).collect();
        let err = GaussianLogParser::default().geometry(&truncated).unwrap_err();
        assert!(matches!(err, ParseError::MalformedRecord { .. }));
    }

    #[test]
    fn test_excited_states_numbered_in_file_order() {
        let text = "\
 Excited State   1:      Singlet-A      3.9741 eV  311.98 nm  f=0.0012  <S**2>=0.000
 Excited State   2:      Triplet-A      2.5000 eV  495.94 nm  f=0.0000  <S**2>=2.000
 Excited State   3:      Singlet-A      4.1000 eV  302.40 nm  f=0.1000  <S**2>=0.000
 Excited State   4:      Triplet-A      2.9000 eV  427.53 nm  f=0.0000  <S**2>=2.000
 Excited State   5:      Singlet-A      4.5000 eV  275.52 nm  f=0.2000  <S**2>=0.000
 Some unrelated line with eV in it
";
        let states = GaussianLogParser::default().excited_states(text).unwrap();
        let singlets: Vec<String> = states.singlets.keys().map(|k| k.to_string()).collect();
        let triplets: Vec<String> = states.triplets.keys().map(|k| k.to_string()).collect();
        assert_eq!(singlets, vec!["S1", "S2", "S3"]);
        assert_eq!(triplets, vec!["T1", "T2"]);
        assert_eq!(states.singlets[&StateLabel::singlet(2)], 4.1);
        assert_eq!(states.triplets[&StateLabel::triplet(2)], 2.9);
    }

    #[test]
    fn test_excited_states_bad_energy_is_malformed() {
        let text = " Excited State   1:      Singlet-A      ****** eV  311.98 nm\n";
        let err = GaussianLogParser::default().excited_states(text).unwrap_err();
        assert!(matches!(err, ParseError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_coupling_line() {
        let text = "<S1|H|T2,1>: 12.3456 cm-1 extra\n";
        let table = GaussianLogParser::default().couplings(text).unwrap();
        let key = TransitionKey::new(StateLabel::singlet(1), StateLabel::triplet(2));
        assert_eq!(table.get(&key), Some(12.3456));
    }

    #[test]
    fn test_coupling_highest_state_label() {
        let text = "header line\n\n<S0|Hso|T*,avg>: 0.5000 cm-1\n";
        let table = GaussianLogParser::default().couplings(text).unwrap();
        assert_eq!(table.len(), 1);
        let (key, _) = table.iter().next().unwrap();
        assert_eq!(key.triplet.to_string(), "T*");
    }

    #[test]
    fn test_coupling_missing_colon_is_malformed() {
        let text = "<S1|H|T2,1> 12.3456 cm-1\n";
        let err = GaussianLogParser::default().couplings(text).unwrap_err();
        match err {
            ParseError::MalformedRecord { line, reason } => {
                assert_eq!(line, 1);
                assert!(reason.contains("':'"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_coupling_missing_fields_is_malformed() {
        let err = GaussianLogParser::default()
            .couplings("<S1|T2>: 1.0 cm-1\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedRecord { .. }));
    }

    #[test]
    fn test_distortion_key_round_trip() {
        let key: DistortionKey = "7_+0.50".parse().unwrap();
        assert_eq!(key.mode, 7);
        assert_eq!(key.sign, Sign::Plus);
        assert_eq!(key.to_string(), "7_+0.50");
        assert_eq!(key.signed_amplitude_text(), "+0.50");
        let neg: DistortionKey = "12_-1.0".parse().unwrap();
        assert!((neg.signed_amplitude() + 1.0).abs() < 1e-12);
        assert!("7_0.5".parse::<DistortionKey>().is_err());
    }

    #[test]
    fn test_distortions_pair_with_following_geometry() {
        let text = format!(
            " Distortion along normal mode N 3 by +0.5\n{}\n Distortion along normal mode N 3 by -0.5\n{}",
            orientation(&[(1, 0.0, 0.0, 0.1)]),
            orientation(&[(1, 0.0, 0.0, -0.1)])
        );
        let records = GaussianLogParser::default().distortions(&text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.to_string(), "3_+0.5");
        assert!((records[0].geometry.atoms[0].position.z - 0.1).abs() < 1e-9);
        assert_eq!(records[1].key.to_string(), "3_-0.5");
        assert!((records[1].geometry.atoms[0].position.z + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_distortions_require_markers() {
        let parser = GaussianLogParser::default();
        let no_header = orientation(&[(1, 0.0, 0.0, 0.0)]);
        assert!(matches!(
            parser.distortions(&no_header),
            Err(ParseError::MissingMarker(_))
        ));
        let no_geometry = " Distortion along normal mode N 3 by +0.5\n";
        assert!(matches!(
            parser.distortions(no_geometry),
            Err(ParseError::MissingMarker(_))
        ));
    }

    #[test]
    fn test_split_distortion_blocks() {
        let text = "\
%chk=a.chk
# td b3lyp

 Distortion along normal mode N 1 by +0.5

0 1
 C 0.0 0.0 0.0

--Link1--
%chk=b.chk
# td b3lyp

 Distortion along normal mode N 2 by +0.5

0 1
 C 0.0 0.0 0.1

--Link1--
%chk=c.chk
# td b3lyp

 Distortion along normal mode N 1 by -0.5

0 1
 C 0.0 0.0 -0.1
";
        let blocks = split_distortion_blocks(text, 1).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].key.to_string(), "1_+0.5");
        assert!(blocks[0].content.starts_with("%chk=a.chk\n"));
        assert!(blocks[0].content.ends_with(" C 0.0 0.0 0.0\n\n"));
        assert!(!blocks[0].content.contains(LINK_MARKER));
        assert_eq!(blocks[1].key.to_string(), "1_-0.5");
        assert!(blocks[1].content.starts_with("%chk=c.chk\n"));

        assert!(split_distortion_blocks(text, 9).unwrap().is_empty());
    }
}
