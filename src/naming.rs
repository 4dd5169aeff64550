//! File and directory naming for every unit and stage.
//!
//! All names derive either from the basename of an input file (the
//! distortion tool's output file, or the molecule input) or from a
//! [`DistortionKey`]. Keeping them in one place lets the pipeline, the
//! reporter and the cleanup pass agree on the layout of a run directory:
//!
//! ```text
//! root/
//!   <tool output>_dist_sing.com
//!   singlets/
//!     <base>_<mode>_<sign><amp>.com / .log / .status.json
//!     VEE<sign><amp>/energy_dis_<key>.com / .log / .chk
//!     soc_dis_<key>/gaussian.com / .log / soc_out.dat
//! ```
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use kisc::naming::FileNaming;
//!
//! let key = "7_+0.5".parse().unwrap();
//! let naming = FileNaming::new(Path::new("mol_dist_sing.com"));
//! assert_eq!(naming.block_input(&key), "mol_dist_sing_7_+0.5.com");
//! assert_eq!(naming.status_file(&key), "mol_dist_sing_7_+0.5.status.json");
//! ```

use crate::parser::DistortionKey;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default stage directory for distortion units.
pub const STAGE_DIR: &str = "singlets";
/// Input file name inside a coupling directory.
pub const COUPLING_INPUT: &str = "gaussian.com";
/// Post-processor configuration copied into each coupling directory.
pub const INIT_SCRIPT: &str = "init.py";
/// Compiled distortion tool, placed in the root.
pub const DISTORTION_EXE: &str = "distort";
/// Rate report written by the single-molecule and rate workflows.
pub const RESULTS_FILE: &str = "results.out";

/// Names derived from an input file's basename.
///
/// Several tool output files may share a stage directory, so every per-unit
/// file is prefixed with the basename of the file it came from.
#[derive(Debug, Clone)]
pub struct FileNaming {
    basename: String,
}

impl FileNaming {
    /// Creates a naming scheme from an input path, using its file stem.
    ///
    /// ```
    /// use std::path::Path;
    /// use kisc::naming::FileNaming;
    ///
    /// let naming = FileNaming::new(Path::new("/runs/benzo.com"));
    /// assert_eq!(naming.basename(), "benzo");
    /// ```
    pub fn new(input_path: &Path) -> Self {
        let basename = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("kisc_job")
            .to_string();

        Self { basename }
    }

    /// Returns the basename used for file naming
    pub fn basename(&self) -> &str {
        &self.basename
    }

    // Distortion units

    /// Unit name: `{basename}_{key}`
    pub fn unit_name(&self, key: &DistortionKey) -> String {
        format!("{}_{}", self.basename, key)
    }

    /// Block input cut from the tool output: `{basename}_{key}.com`
    pub fn block_input(&self, key: &DistortionKey) -> String {
        format!("{}.com", self.unit_name(key))
    }

    /// Persisted unit status: `{basename}_{key}.status.json`
    pub fn status_file(&self, key: &DistortionKey) -> String {
        format!("{}.status.json", self.unit_name(key))
    }

    // Single-molecule workflow

    /// Excited-state energy input: `{basename}_st-energy.com`
    pub fn state_energy_input(&self) -> String {
        format!("{}_st-energy.com", self.basename)
    }

    /// Coupling directory: `{basename}_soc`
    pub fn coupling_dir(&self) -> String {
        format!("{}_soc", self.basename)
    }

    /// Debug log for file logging: `kisc_debug_{basename}.log`
    pub fn debug_log(&self) -> String {
        format!("kisc_debug_{}.log", self.basename)
    }
}

/// Job name of a unit's excitation-energy calculation: `energy_dis_{key}`.
pub fn energy_job_name(key: &DistortionKey) -> String {
    format!("energy_dis_{}", key)
}

/// Directory collecting energy jobs of one amplitude: `VEE{sign}{amp}`.
pub fn vee_dir_name(key: &DistortionKey) -> String {
    format!("VEE{}", key.signed_amplitude_text())
}

/// Coupling directory of a unit: `soc_dis_{key}`.
pub fn coupling_dir_name(key: &DistortionKey) -> String {
    format!("soc_dis_{}", key)
}

/// Engine log expected next to an input file.
pub fn log_path(input: &Path, log_extension: &str) -> PathBuf {
    input.with_extension(log_extension.trim_start_matches('.'))
}

/// Recovers the signed amplitude from a coupling directory name.
///
/// The last `_`-separated field is read either as a signed number (`+0.5`,
/// `-1.0`) or with a trailing sign (`1+`, `0.5-`). Anything else yields 0.0
/// with a warning.
///
/// ```
/// use kisc::naming::amplitude_from_dir_name;
///
/// assert_eq!(amplitude_from_dir_name("soc_dis_7_+0.5"), 0.5);
/// assert_eq!(amplitude_from_dir_name("soc_dis_7_0.5-"), -0.5);
/// assert_eq!(amplitude_from_dir_name("garbage"), 0.0);
/// ```
pub fn amplitude_from_dir_name(name: &str) -> f64 {
    let field = name.rsplit('_').next().unwrap_or(name);
    let parsed = if let Some(rest) = field.strip_suffix('+') {
        rest.parse::<f64>()
    } else if let Some(rest) = field.strip_suffix('-') {
        rest.parse::<f64>().map(|v| -v)
    } else {
        field.parse::<f64>()
    };
    match parsed {
        Ok(v) => v,
        Err(_) => {
            log::warn!("Could not parse distortion amplitude from '{}'", name);
            0.0
        }
    }
}

/// Mode index encoded in a coupling directory name (`soc_dis_{mode}_{amp}`).
pub fn mode_from_dir_name(name: &str) -> Option<u32> {
    let mut fields = name.rsplit('_');
    fields.next()?;
    fields.next()?.parse().ok()
}

/// Compiles a shell-style file pattern (`*`, `?`) into an anchored regex.
///
/// ```
/// use kisc::naming::pattern_regex;
///
/// let re = pattern_regex("*dist_sing*").unwrap();
/// assert!(re.is_match("mol_dist_sing.com"));
/// assert!(!re.is_match("mol_dist_trip.com"));
/// ```
pub fn pattern_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// Entries of `dir` whose file name matches `pattern`, sorted by name.
///
/// Only the directory itself is scanned; `want_dirs` selects directories
/// instead of regular files.
pub fn matching_entries(dir: &Path, pattern: &Regex, want_dirs: bool) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !dir.is_dir() {
        return Ok(found);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() != want_dirs {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if pattern.is_match(name) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}
