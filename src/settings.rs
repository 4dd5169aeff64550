//! Configuration management for kisc.
//!
//! Settings are read from INI files with the following precedence, highest
//! first:
//!
//! 1. An explicit path given on the command line
//! 2. Local configuration (`./kisc_config.cfg`)
//! 3. User configuration (`~/.config/kisc/kisc_config.cfg`)
//! 4. System configuration (`/etc/kisc/kisc_config.cfg`)
//! 5. Built-in defaults
//!
//! Files are layered: each one only overrides the keys it sets, so a local
//! file can change a single value and inherit everything else.
//!
//! # Configuration File Format
//!
//! ```ini
//! [resources]
//! cores = 25
//! memory_gb = 60
//!
//! [calculation]
//! method_basis = b3lyp/6-311++g
//!
//! [distortion]
//! modes = 1-10,75,83
//!
//! [coupling]
//! init_script = /home/user/pysoc/init.py
//! ```
//!
//! `kisc ci kisc_config.cfg` writes a commented template with every option.
//!
//! # Usage
//!
//! ```no_run
//! use kisc::settings::SettingsManager;
//!
//! let manager = SettingsManager::load(None).unwrap();
//! let workflow = manager.settings().workflow_config().unwrap();
//! println!("engine: {}", workflow.engine_command);
//! ```

use crate::cleanup::CleanupConfig;
use crate::input::{JobResources, StateWindow};
use crate::pipeline::WorkflowConfig;
use crate::rate::RateParameters;
use configparser::ini::Ini;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "kisc_config.cfg";

/// Errors that can occur during configuration loading and processing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading configuration files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// INI parsing error
    #[error("INI parsing error: {0}")]
    IniParse(String),
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

type Section = HashMap<String, Option<String>>;

/// Main configuration structure containing all program settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Quantum-chemistry engine
    pub engine: EngineSettings,
    /// Job resources
    pub resources: ResourceSettings,
    /// Level of theory
    pub calculation: CalculationSettings,
    /// Distortion tool and active modes
    pub distortion: DistortionSettings,
    /// Coupling post-processor
    pub coupling: CouplingSettings,
    /// Rate expression and reports
    pub rate: RateSettings,
    /// Run directory layout and failure policy
    pub workflow: WorkflowSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
    /// Cleanup configuration
    pub cleanup: CleanupSettings,
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Engine executable (default: "g16")
    pub command: String,
    /// Log file extension (default: "log")
    pub log_extension: String,
    /// Phrase on the last line of a finished log
    pub termination_phrase: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command: "g16".to_string(),
            log_extension: "log".to_string(),
            termination_phrase: crate::parser::GAUSSIAN_NORMAL_TERMINATION.to_string(),
        }
    }
}

/// Resources written into generated inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSettings {
    /// `%nprocshared` (default: 4)
    pub cores: u32,
    /// `%mem` in GB (default: 4)
    pub memory_gb: u32,
    /// Molecular charge (default: 0)
    pub charge: i32,
    /// Spin multiplicity (default: 1)
    pub multiplicity: u32,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        let res = JobResources::default();
        Self {
            cores: res.cores,
            memory_gb: res.memory_gb,
            charge: res.charge,
            multiplicity: res.multiplicity,
        }
    }
}

/// Level of theory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationSettings {
    /// Method and basis set (default: "b3lyp/6-31g(d)")
    pub method_basis: String,
    /// TD-DFT states (default: 10)
    pub nstates: u32,
    /// State window of distortion energy jobs (default: "singlets")
    pub energy_window: String,
}

impl Default for CalculationSettings {
    fn default() -> Self {
        let res = JobResources::default();
        Self {
            method_basis: res.method_basis,
            nstates: res.nstates,
            energy_window: StateWindow::Singlets.to_string(),
        }
    }
}

/// Distortion tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistortionSettings {
    /// Tool source (default: "distort.f90")
    pub source: String,
    /// Compiler (default: "gfortran")
    pub compiler: String,
    /// File redirected to the tool's stdin (default: "inp_sing.txt")
    pub input: String,
    /// Pattern of the tool's output files (default: "*dist_sing*")
    pub output_pattern: String,
    /// Active normal modes
    pub modes: Vec<u32>,
}

impl Default for DistortionSettings {
    fn default() -> Self {
        Self {
            source: "distort.f90".to_string(),
            compiler: "gfortran".to_string(),
            input: "inp_sing.txt".to_string(),
            output_pattern: "*dist_sing*".to_string(),
            modes: Vec::new(),
        }
    }
}

/// Coupling post-processor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingSettings {
    /// Post-processor executable (default: "pysoc.py")
    pub command: String,
    /// Its output file (default: "soc_out.dat")
    pub output_file: String,
    /// `init.py` copied into each coupling directory (default: none)
    pub init_script: Option<String>,
}

impl Default for CouplingSettings {
    fn default() -> Self {
        Self {
            command: "pysoc.py".to_string(),
            output_file: "soc_out.dat".to_string(),
            init_script: None,
        }
    }
}

/// Rate and report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSettings {
    /// λ in eV (default: 0.2)
    pub reorganization_energy: f64,
    /// Temperature in K (default: 300)
    pub temperature: f64,
    /// Strongest couplings listed in rate reports (default: 5, 0 disables)
    pub top_transitions: usize,
    /// Highest singlet in SOC-vs-distortion tables (default: 6)
    pub report_singlets: u32,
}

impl Default for RateSettings {
    fn default() -> Self {
        let p = RateParameters::default();
        Self {
            reorganization_energy: p.reorganization_energy,
            temperature: p.temperature,
            top_transitions: 5,
            report_singlets: 6,
        }
    }
}

/// Run directory and failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Run directory (default: ".")
    pub root: String,
    /// Stage directory for distortion units (default: "singlets")
    pub stage_dir: String,
    /// Wall-clock limit per program in hours, 0 for none (default: 48)
    pub timeout_hours: f64,
    /// Keep going after a failed unit (default: true)
    pub continue_on_failure: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            stage_dir: crate::naming::STAGE_DIR.to_string(),
            timeout_hours: 48.0,
            continue_on_failure: true,
        }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (default: "info")
    pub level: String,
    /// Enable file-based logging (default: false)
    /// When enabled, log output goes to kisc_debug_<input_basename>.log
    pub file_logging: bool,
    /// Print level for file operations (default: 1)
    /// 0 = quiet, 1 = normal, 2 = verbose
    pub print_level: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            print_level: 1,
        }
    }
}

/// Cleanup configuration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Enable or disable cleanup (default: true)
    pub enabled: bool,
    /// Clean each coupling directory after post-processing (default: false)
    pub after_coupling: bool,
    /// Scratch file names (default: gaussian.chk, gaussian.rwf)
    pub scratch_files: Vec<String>,
    /// Coupling directory pattern (default: "*soc_dis*")
    pub dir_pattern: String,
    /// Verbosity level for cleanup operations (default: 1)
    /// 0 = quiet, 1 = normal, 2 = verbose
    pub verbose: u32,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        let c = CleanupConfig::default();
        Self {
            enabled: c.enabled,
            after_coupling: false,
            scratch_files: c.scratch_files,
            dir_pattern: c.dir_pattern,
            verbose: c.verbose,
        }
    }
}

/// Parses a list of normal modes such as `1-10,75,83`.
///
/// Ranges are inclusive. The result is sorted and free of duplicates.
///
/// ```
/// use kisc::settings::parse_modes;
///
/// assert_eq!(parse_modes("3-5, 10,4").unwrap(), vec![3, 4, 5, 10]);
/// assert!(parse_modes("5-3").is_err());
/// ```
pub fn parse_modes(text: &str) -> Result<Vec<u32>, ConfigError> {
    let mut modes = Vec::new();
    let invalid = |item: &str| ConfigError::InvalidValue(format!("Invalid mode list entry: {}", item));

    for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.split_once('-') {
            Some((a, b)) => {
                let start: u32 = a.trim().parse().map_err(|_| invalid(item))?;
                let end: u32 = b.trim().parse().map_err(|_| invalid(item))?;
                if start == 0 || start > end {
                    return Err(invalid(item));
                }
                modes.extend(start..=end);
            }
            None => {
                let mode: u32 = item.parse().map_err(|_| invalid(item))?;
                if mode == 0 {
                    return Err(invalid(item));
                }
                modes.push(mode);
            }
        }
    }

    modes.sort_unstable();
    modes.dedup();
    Ok(modes)
}

fn value<'a>(section: &'a Section, key: &str) -> Option<&'a str> {
    section
        .get(key)
        .and_then(|v| v.as_deref())
        .map(str::trim)
}

fn parse_into<T: FromStr>(section: &Section, key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Some(raw) = value(section, key) {
        *target = raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("Invalid {}: {}", key, raw)))?;
    }
    Ok(())
}

fn string_into(section: &Section, key: &str, target: &mut String) {
    if let Some(raw) = value(section, key) {
        if !raw.is_empty() {
            *target = raw.to_string();
        }
    }
}

/// Configuration manager that handles loading and accessing program settings.
pub struct SettingsManager {
    settings: Settings,
    config_source: String,
}

impl SettingsManager {
    /// Loads configuration from the available configuration files.
    ///
    /// An `explicit` path must exist; the standard locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (settings, source) = Self::load_from_files(explicit)?;
        info!("Configuration loaded from: {}", source);
        Ok(Self {
            settings,
            config_source: source,
        })
    }

    /// Wraps already-built settings.
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            settings,
            config_source: "built-in defaults".to_string(),
        }
    }

    /// Returns the source of the loaded configuration.
    pub fn config_source(&self) -> &str {
        &self.config_source
    }

    /// Gets a reference to the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Gets the logging settings.
    pub fn logging(&self) -> &LoggingSettings {
        &self.settings.logging
    }

    /// Gets the cleanup settings.
    pub fn cleanup(&self) -> &CleanupSettings {
        &self.settings.cleanup
    }

    /// Loads configuration from files with hierarchical precedence.
    fn load_from_files(explicit: Option<&Path>) -> Result<(Settings, String), ConfigError> {
        let mut settings = Settings::default();
        let mut config_source = "built-in defaults".to_string();

        let candidates = [
            ("system config", Self::get_system_config_path()),
            ("user config", Self::get_user_config_path()),
            ("local config", Some(PathBuf::from(CONFIG_FILE))),
        ];
        for (label, path) in candidates {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            match Self::apply_config(&mut settings, &path) {
                Ok(()) => {
                    config_source = format!("{} ({})", label, path.display());
                    debug!("Loaded {} from: {}", label, path.display());
                }
                Err(e) => {
                    warn!("Failed to load {} from {}: {}", label, path.display(), e);
                }
            }
        }

        if let Some(path) = explicit {
            Self::apply_config(&mut settings, path)?;
            config_source = format!("explicit config ({})", path.display());
        }

        Ok((settings, config_source))
    }

    /// Reads one INI file and applies its values on top of `settings`.
    fn apply_config(settings: &mut Settings, path: &Path) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::apply_str(settings, &content)
    }

    /// Applies INI text on top of `settings`.
    pub fn apply_str(settings: &mut Settings, content: &str) -> Result<(), ConfigError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|e| ConfigError::IniParse(format!("Failed to parse INI: {}", e)))?;
        let map = ini.get_map_ref();

        if let Some(section) = map.get("engine") {
            Self::parse_engine(section, &mut settings.engine);
        }
        if let Some(section) = map.get("resources") {
            Self::parse_resources(section, &mut settings.resources)?;
        }
        if let Some(section) = map.get("calculation") {
            Self::parse_calculation(section, &mut settings.calculation)?;
        }
        if let Some(section) = map.get("distortion") {
            Self::parse_distortion(section, &mut settings.distortion)?;
        }
        if let Some(section) = map.get("coupling") {
            Self::parse_coupling(section, &mut settings.coupling);
        }
        if let Some(section) = map.get("rate") {
            Self::parse_rate(section, &mut settings.rate)?;
        }
        if let Some(section) = map.get("workflow") {
            Self::parse_workflow(section, &mut settings.workflow)?;
        }
        if let Some(section) = map.get("logging") {
            Self::parse_logging(section, &mut settings.logging)?;
        }
        if let Some(section) = map.get("cleanup") {
            Self::parse_cleanup(section, &mut settings.cleanup)?;
        }

        Ok(())
    }

    fn parse_engine(section: &Section, engine: &mut EngineSettings) {
        string_into(section, "command", &mut engine.command);
        string_into(section, "log_extension", &mut engine.log_extension);
        string_into(section, "termination_phrase", &mut engine.termination_phrase);
    }

    fn parse_resources(section: &Section, res: &mut ResourceSettings) -> Result<(), ConfigError> {
        parse_into(section, "cores", &mut res.cores)?;
        parse_into(section, "memory_gb", &mut res.memory_gb)?;
        parse_into(section, "charge", &mut res.charge)?;
        parse_into(section, "multiplicity", &mut res.multiplicity)?;
        if res.cores == 0 || res.memory_gb == 0 {
            return Err(ConfigError::InvalidValue(
                "cores and memory_gb must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn parse_calculation(
        section: &Section,
        calc: &mut CalculationSettings,
    ) -> Result<(), ConfigError> {
        string_into(section, "method_basis", &mut calc.method_basis);
        parse_into(section, "nstates", &mut calc.nstates)?;
        if let Some(window) = value(section, "energy_window") {
            window.parse::<StateWindow>().map_err(ConfigError::InvalidValue)?;
            calc.energy_window = window.to_string();
        }
        Ok(())
    }

    fn parse_distortion(
        section: &Section,
        dist: &mut DistortionSettings,
    ) -> Result<(), ConfigError> {
        string_into(section, "source", &mut dist.source);
        string_into(section, "compiler", &mut dist.compiler);
        string_into(section, "input", &mut dist.input);
        string_into(section, "output_pattern", &mut dist.output_pattern);
        if let Some(modes) = value(section, "modes") {
            dist.modes = parse_modes(modes)?;
        }
        Ok(())
    }

    fn parse_coupling(section: &Section, coupling: &mut CouplingSettings) {
        string_into(section, "command", &mut coupling.command);
        string_into(section, "output_file", &mut coupling.output_file);
        if let Some(init) = value(section, "init_script") {
            coupling.init_script = if init.is_empty() {
                None
            } else {
                Some(init.to_string())
            };
        }
    }

    fn parse_rate(section: &Section, rate: &mut RateSettings) -> Result<(), ConfigError> {
        parse_into(section, "reorganization_energy", &mut rate.reorganization_energy)?;
        parse_into(section, "temperature", &mut rate.temperature)?;
        parse_into(section, "top_transitions", &mut rate.top_transitions)?;
        parse_into(section, "report_singlets", &mut rate.report_singlets)?;
        if rate.reorganization_energy <= 0.0 || rate.temperature <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "reorganization_energy and temperature must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn parse_workflow(section: &Section, wf: &mut WorkflowSettings) -> Result<(), ConfigError> {
        string_into(section, "root", &mut wf.root);
        string_into(section, "stage_dir", &mut wf.stage_dir);
        parse_into(section, "timeout_hours", &mut wf.timeout_hours)?;
        parse_into(section, "continue_on_failure", &mut wf.continue_on_failure)?;
        if wf.timeout_hours < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid timeout_hours: {}",
                wf.timeout_hours
            )));
        }
        Ok(())
    }

    fn parse_logging(section: &Section, logging: &mut LoggingSettings) -> Result<(), ConfigError> {
        string_into(section, "level", &mut logging.level);
        parse_into(section, "file_logging", &mut logging.file_logging)?;
        parse_into(section, "print_level", &mut logging.print_level)?;
        Ok(())
    }

    fn parse_cleanup(section: &Section, cleanup: &mut CleanupSettings) -> Result<(), ConfigError> {
        parse_into(section, "enabled", &mut cleanup.enabled)?;
        parse_into(section, "after_coupling", &mut cleanup.after_coupling)?;
        if let Some(files) = value(section, "scratch_files") {
            cleanup.scratch_files = files
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        string_into(section, "dir_pattern", &mut cleanup.dir_pattern);
        parse_into(section, "verbose", &mut cleanup.verbose)?;
        Ok(())
    }

    /// Gets the system configuration file path.
    fn get_system_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            Some(PathBuf::from("/etc/kisc").join(CONFIG_FILE))
        }
        #[cfg(windows)]
        {
            std::env::var("PROGRAMDATA")
                .ok()
                .map(|pd| PathBuf::from(pd).join("kisc").join(CONFIG_FILE))
        }
    }

    /// Gets the user configuration file path.
    fn get_user_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            std::env::var("HOME").ok().map(|home| {
                PathBuf::from(home)
                    .join(".config")
                    .join("kisc")
                    .join(CONFIG_FILE)
            })
        }
        #[cfg(windows)]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|appdata| PathBuf::from(appdata).join("kisc").join(CONFIG_FILE))
        }
    }
}

impl SettingsManager {
    /// Creates a kisc_config.cfg template with every option and its default.
    pub fn create_template(path: &Path) -> Result<(), ConfigError> {
        let template_content = Self::generate_template_content();
        fs::write(path, template_content)?;
        info!("Created settings template at: {}", path.display());
        Ok(())
    }

    /// Generates the content for a kisc_config.cfg template file.
    fn generate_template_content() -> String {
        let engine = EngineSettings::default();
        let res = ResourceSettings::default();
        let calc = CalculationSettings::default();
        let dist = DistortionSettings::default();
        let coupling = CouplingSettings::default();
        let rate = RateSettings::default();
        let wf = WorkflowSettings::default();
        let logging = LoggingSettings::default();
        let cleanup = CleanupSettings::default();

        format!(
            r#"# kisc Configuration File
#
# Configuration files are loaded in hierarchical order, later ones
# overriding single values of earlier ones:
#
# 1. System config (/etc/kisc/kisc_config.cfg)
# 2. User config (~/.config/kisc/kisc_config.cfg)
# 3. Current working directory (./kisc_config.cfg)
# 4. A file named on the command line - highest priority
#
# Any missing sections or values use the built-in defaults shown below.

[engine]
# Quantum-chemistry engine executable (default: {})
command = {}
# Extension of engine logs (default: {})
log_extension = {}
# Text on the last line of a normally finished log
termination_phrase = {}

[resources]
# Written as %nprocshared and %mem into generated inputs
cores = {}
memory_gb = {}
charge = {}
multiplicity = {}

[calculation]
# Method and basis set of energy and coupling jobs
method_basis = {}
# Number of TD-DFT states
nstates = {}
# State window of distortion energy jobs: singlets, triplets or 50-50
energy_window = {}

[distortion]
# Distortion tool source, compiled once with the compiler below
source = {}
compiler = {}
# File fed to the tool's standard input
input = {}
# Pattern of the tool's output files in the run directory
output_pattern = {}
# Active normal modes: list and ranges, e.g. 1-10,75,83
modes =

[coupling]
# Coupling post-processor, run without arguments in each coupling directory
command = {}
# File it writes
output_file = {}
# init.py copied into each coupling directory (empty: none)
init_script =

[rate]
# Reorganization energy in eV
reorganization_energy = {}
# Temperature in K
temperature = {}
# Strongest couplings listed in rate reports (0 disables the section)
top_transitions = {}
# Highest singlet shown in SOC-vs-distortion tables
report_singlets = {}

[workflow]
# Run directory; relative paths elsewhere are taken relative to it
root = {}
# Directory of distortion units under the run directory
stage_dir = {}
# Wall-clock limit per external program in hours (0: none)
timeout_hours = {}
# Continue with the next unit after a failure (false: abort the batch)
continue_on_failure = {}

[logging]
# Log level: debug, info, warn, error (RUST_LOG overrides)
level = {}
# Write log output to kisc_debug_<input>.log instead of the console
file_logging = {}
# 0 = quiet, 1 = normal, 2 = verbose file operations
print_level = {}

[cleanup]
# Allow removal of engine scratch files from coupling directories
enabled = {}
# Clean each coupling directory right after its post-processor finishes
after_coupling = {}
# Scratch files to remove (comma-separated)
scratch_files = {}
# Coupling directories inside the stage directory
dir_pattern = {}
# 0 = quiet, 1 = normal, 2 = verbose
verbose = {}
"#,
            engine.command,
            engine.command,
            engine.log_extension,
            engine.log_extension,
            engine.termination_phrase,
            res.cores,
            res.memory_gb,
            res.charge,
            res.multiplicity,
            calc.method_basis,
            calc.nstates,
            calc.energy_window,
            dist.source,
            dist.compiler,
            dist.input,
            dist.output_pattern,
            coupling.command,
            coupling.output_file,
            rate.reorganization_energy,
            rate.temperature,
            rate.top_transitions,
            rate.report_singlets,
            wf.root,
            wf.stage_dir,
            wf.timeout_hours,
            wf.continue_on_failure,
            logging.level,
            logging.file_logging,
            logging.print_level,
            cleanup.enabled,
            cleanup.after_coupling,
            cleanup.scratch_files.join(", "),
            cleanup.dir_pattern,
            cleanup.verbose,
        )
    }
}

impl Settings {
    /// Job resources for generated inputs.
    pub fn job_resources(&self) -> JobResources {
        JobResources {
            cores: self.resources.cores,
            memory_gb: self.resources.memory_gb,
            method_basis: self.calculation.method_basis.clone(),
            nstates: self.calculation.nstates,
            charge: self.resources.charge,
            multiplicity: self.resources.multiplicity,
        }
    }

    /// Rate parameters.
    pub fn rate_parameters(&self) -> RateParameters {
        RateParameters {
            reorganization_energy: self.rate.reorganization_energy,
            temperature: self.rate.temperature,
        }
    }

    /// Resolves the settings into a workflow configuration.
    pub fn workflow_config(&self) -> Result<WorkflowConfig, ConfigError> {
        let energy_window = self
            .calculation
            .energy_window
            .parse::<StateWindow>()
            .map_err(ConfigError::InvalidValue)?;
        let timeout = if self.workflow.timeout_hours > 0.0 {
            Some(Duration::from_secs_f64(self.workflow.timeout_hours * 3600.0))
        } else {
            None
        };

        Ok(WorkflowConfig {
            root: PathBuf::from(&self.workflow.root),
            stage_dir: self.workflow.stage_dir.clone(),
            engine_command: self.engine.command.clone(),
            log_extension: self.engine.log_extension.clone(),
            termination_phrase: self.engine.termination_phrase.clone(),
            coupling_command: self.coupling.command.clone(),
            coupling_output: self.coupling.output_file.clone(),
            init_script: self.coupling.init_script.as_ref().map(PathBuf::from),
            compiler: self.distortion.compiler.clone(),
            distortion_source: PathBuf::from(&self.distortion.source),
            distortion_input: PathBuf::from(&self.distortion.input),
            output_pattern: self.distortion.output_pattern.clone(),
            modes: self.distortion.modes.clone(),
            resources: self.job_resources(),
            energy_window,
            timeout,
            continue_on_failure: self.workflow.continue_on_failure,
            cleanup: CleanupConfig::from_settings(self),
            cleanup_after_coupling: self.cleanup.after_coupling,
            rate: self.rate_parameters(),
            top_transitions: self.rate.top_transitions,
            report_singlets: self.rate.report_singlets,
        })
    }
}
