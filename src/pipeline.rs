//! Orchestration of dependent engine runs.
//!
//! Two workflows are driven from here:
//!
//! - **Distortion batch**: run the distortion tool, cut its combined output
//!   into one job per (mode, amplitude) unit, and take every unit through
//!   block run → geometry extraction → excitation energies → spin-orbit
//!   coupling. Finally collect SOC-vs-distortion tables.
//! - **Single molecule**: opt+freq → excitation energies → spin-orbit
//!   coupling → `k_ISC` report.
//!
//! # Resumption
//!
//! The filesystem is the durable state. Before the engine is started for a
//! stage, the stage's expected log is looked up: a complete log means the
//! stage is skipped, an incomplete one stops the unit with
//! [`RunError::IncompleteCalculation`]. The only exception is a unit whose
//! status record shows it was interrupted mid-stage (see
//! [`crate::checkpoint`]); its partial log is discarded and the stage re-run.
//! A second pass over a finished tree therefore starts no programs at all.
//!
//! # Failure Handling
//!
//! Any error stops the current unit and is recorded as `FAILED` in its
//! status file. With `continue_on_failure` the batch moves on to the next
//! unit and reports the failures at the end; otherwise it aborts.
//!
//! Runs over one root are assumed to be the only writer. Two concurrent
//! batches over the same directory race on the check-then-run steps.

use crate::checkpoint::{CheckpointError, StatusFile, UnitStage};
use crate::cleanup::{CleanupConfig, CleanupError, CleanupManager};
use crate::geometry::{Geometry, GeometryError};
use crate::input::{self, InputError, JobResources, StateWindow};
use crate::naming::{
    coupling_dir_name, energy_job_name, log_path, matching_entries, pattern_regex, vee_dir_name,
    FileNaming, COUPLING_INPUT, DISTORTION_EXE, INIT_SCRIPT, RESULTS_FILE,
};
use crate::parser::{
    read_log, split_distortion_blocks, DistortionBlock, DistortionKey, GaussianLogParser,
    LogParser, ParseError, GAUSSIAN_NORMAL_TERMINATION,
};
use crate::rate::{self, RateParameters, RateResult};
use crate::report::{self, ReportError};
use crate::runner::{
    compile_invocation, coupling_invocation, engine_invocation, is_complete, tool_invocation,
    verify_completion, Invocation, ProcessOutput, ProcessRunner, RunError,
};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Lines of captured output kept in process failure messages.
const FAILURE_TAIL_LINES: usize = 20;

/// Errors raised by the workflows.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Engine output could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// An input file could not be generated
    #[error("Input error: {0}")]
    Input(#[from] InputError),
    /// An external program could not be run or did not finish properly
    #[error("{0}")]
    Run(#[from] RunError),
    /// Geometries of one molecule disagree
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    /// Unit status could not be persisted or advanced
    #[error("Status error: {0}")]
    Status(#[from] CheckpointError),
    /// Reports could not be written
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    /// Scratch cleanup failed
    #[error("Cleanup error: {0}")]
    Cleanup(#[from] CleanupError),
    /// A configured file pattern is not usable
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    /// An external program exited unsuccessfully
    #[error("'{command}' failed (exit code {code:?}):\n{detail}")]
    ExternalProcess {
        /// Command line
        command: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Tail of the captured output
        detail: String,
    },
    /// The distortion tool left no output files
    #[error("no files matching '{pattern}' in {dir}")]
    NoDistortionOutput {
        /// Configured output pattern
        pattern: String,
        /// Directory searched
        dir: PathBuf,
    },
    /// A required input file does not exist
    #[error("required input not found: {0}")]
    MissingInput(PathBuf),
    /// The batch stopped at a failed unit
    #[error("batch aborted at unit {unit}: {reason}")]
    Aborted {
        /// Failed unit
        unit: String,
        /// Its error
        reason: String,
    },
}

/// Type alias for pipeline results
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Everything the workflows need to know, resolved from settings.
///
/// Relative paths are taken relative to `root`; nothing depends on the
/// process's current directory.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Run directory
    pub root: PathBuf,
    /// Stage directory name under `root` for distortion units
    pub stage_dir: String,
    /// Engine executable
    pub engine_command: String,
    /// Extension of engine logs
    pub log_extension: String,
    /// Phrase marking a normally terminated log
    pub termination_phrase: String,
    /// Coupling post-processor executable
    pub coupling_command: String,
    /// Output file of the post-processor
    pub coupling_output: String,
    /// Post-processor configuration copied into each coupling directory
    pub init_script: Option<PathBuf>,
    /// Compiler for the distortion tool
    pub compiler: String,
    /// Distortion tool source
    pub distortion_source: PathBuf,
    /// File fed to the distortion tool's stdin
    pub distortion_input: PathBuf,
    /// Pattern of the distortion tool's output files in `root`
    pub output_pattern: String,
    /// Active normal modes
    pub modes: Vec<u32>,
    /// Resources and level of theory of generated jobs
    pub resources: JobResources,
    /// State window of distortion energy jobs
    pub energy_window: StateWindow,
    /// Wall-clock limit per external program
    pub timeout: Option<Duration>,
    /// Keep going after a failed unit
    pub continue_on_failure: bool,
    /// Scratch cleanup settings
    pub cleanup: CleanupConfig,
    /// Clean each coupling directory after its post-processor
    pub cleanup_after_coupling: bool,
    /// Rate expression parameters
    pub rate: RateParameters,
    /// Size of the strongest-couplings section of rate reports
    pub top_transitions: usize,
    /// Highest singlet shown in SOC-vs-distortion tables
    pub report_singlets: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            stage_dir: crate::naming::STAGE_DIR.to_string(),
            engine_command: "g16".to_string(),
            log_extension: "log".to_string(),
            termination_phrase: GAUSSIAN_NORMAL_TERMINATION.to_string(),
            coupling_command: "pysoc.py".to_string(),
            coupling_output: "soc_out.dat".to_string(),
            init_script: None,
            compiler: "gfortran".to_string(),
            distortion_source: PathBuf::from("distort.f90"),
            distortion_input: PathBuf::from("inp_sing.txt"),
            output_pattern: "*dist_sing*".to_string(),
            modes: Vec::new(),
            resources: JobResources::default(),
            energy_window: StateWindow::Singlets,
            timeout: Some(Duration::from_secs(48 * 3600)),
            continue_on_failure: true,
            cleanup: CleanupConfig::default(),
            cleanup_after_coupling: false,
            rate: RateParameters::default(),
            top_transitions: 5,
            report_singlets: 6,
        }
    }
}

impl WorkflowConfig {
    /// Directory holding distortion units.
    pub fn stage_path(&self) -> PathBuf {
        self.root.join(&self.stage_dir)
    }

    /// Resolves `path` against `root` unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Paths of one distortion unit.
#[derive(Debug, Clone)]
pub struct UnitContext {
    /// Mode and amplitude
    pub key: DistortionKey,
    /// Naming derived from the tool output file the unit came from
    pub naming: FileNaming,
    /// Stage directory
    pub stage_dir: PathBuf,
    log_extension: String,
}

impl UnitContext {
    /// Context of `key` from the file behind `naming`.
    pub fn new(key: DistortionKey, naming: FileNaming, config: &WorkflowConfig) -> Self {
        Self {
            key,
            naming,
            stage_dir: config.stage_path(),
            log_extension: config.log_extension.clone(),
        }
    }

    /// Unit name used in logs and summaries.
    pub fn name(&self) -> String {
        self.naming.unit_name(&self.key)
    }

    /// Block input cut from the tool output.
    pub fn block_input(&self) -> PathBuf {
        self.stage_dir.join(self.naming.block_input(&self.key))
    }

    /// Log of the block run.
    pub fn block_log(&self) -> PathBuf {
        log_path(&self.block_input(), &self.log_extension)
    }

    /// Status record.
    pub fn status_path(&self) -> PathBuf {
        self.stage_dir.join(self.naming.status_file(&self.key))
    }

    /// Energy input, written and run in the stage directory.
    pub fn energy_input(&self) -> PathBuf {
        self.stage_dir
            .join(format!("{}.com", energy_job_name(&self.key)))
    }

    /// Directory the energy job's files are filed into.
    pub fn vee_dir(&self) -> PathBuf {
        self.stage_dir.join(vee_dir_name(&self.key))
    }

    /// Energy log after filing.
    pub fn energy_log(&self) -> PathBuf {
        self.vee_dir().join(format!(
            "{}.{}",
            energy_job_name(&self.key),
            self.log_extension
        ))
    }

    /// Coupling directory.
    pub fn coupling_dir(&self) -> PathBuf {
        self.stage_dir.join(coupling_dir_name(&self.key))
    }
}

/// Outcome of a distortion batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Units that reached `COUPLING_COMPLETE`
    pub completed: Vec<String>,
    /// Failed units with their errors
    pub failed: Vec<(String, String)>,
    /// SOC-vs-distortion tables written
    pub tables: Vec<PathBuf>,
}

impl BatchSummary {
    /// True when no unit failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of the single-molecule workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeOutcome {
    /// Optimized geometry
    pub geometry: Geometry,
    /// Rate report path
    pub report: PathBuf,
    /// Computed rates
    pub rates: RateResult,
}

/// Drives the workflows through a [`ProcessRunner`].
pub struct Pipeline<R: ProcessRunner> {
    config: WorkflowConfig,
    runner: R,
    parser: GaussianLogParser,
}

impl<R: ProcessRunner> Pipeline<R> {
    /// Creates a pipeline; the log parser uses the configured termination
    /// phrase.
    pub fn new(config: WorkflowConfig, runner: R) -> Self {
        let parser = GaussianLogParser::new(config.termination_phrase.clone());
        Self {
            config,
            runner,
            parser,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// The runner, e.g. to inspect a recording stub.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// The log parser.
    pub fn parser(&self) -> &dyn LogParser {
        &self.parser
    }

    fn invoke(&self, invocation: Invocation) -> Result<ProcessOutput> {
        let output = self.runner.run(&invocation)?;
        if !output.success {
            return Err(PipelineError::ExternalProcess {
                command: invocation.command_line(),
                code: output.code,
                detail: output.tail(FAILURE_TAIL_LINES),
            });
        }
        Ok(output)
    }

    /// Runs the engine on `input` unless `log` already holds a finished run.
    ///
    /// With `interrupted`, an incomplete `log` is a leftover of a killed run
    /// and is deleted first. Returns whether the engine was started.
    fn engine_stage(&self, input: &Path, log: &Path, interrupted: bool) -> Result<bool> {
        if log.exists() {
            if interrupted && !is_complete(log, &self.parser) {
                warn!(
                    "Discarding incomplete {} left by an interrupted run",
                    log.display()
                );
                fs::remove_file(log)?;
            } else {
                verify_completion(log, &self.parser)?;
                info!("{} already complete, skipping", log.display());
                return Ok(false);
            }
        }

        let invocation = engine_invocation(&self.config.engine_command, input, self.config.timeout);
        self.invoke(invocation)?;
        verify_completion(log, &self.parser)?;
        info!("Calculation terminated normally: {}", log.display());
        Ok(true)
    }

    /// Moves every file of `dir` matching `pattern` into `dest`.
    pub fn move_matching(&self, dir: &Path, pattern: &str, dest: &Path) -> Result<usize> {
        let regex = pattern_regex(pattern)?;
        let files = matching_entries(dir, &regex, false)?;
        if files.is_empty() {
            return Ok(0);
        }
        fs::create_dir_all(dest)?;
        for file in &files {
            if let Some(name) = file.file_name() {
                fs::rename(file, dest.join(name))?;
                debug!("Moved {} to {}", file.display(), dest.display());
            }
        }
        Ok(files.len())
    }

    fn copy_init_script(&self, dir: &Path) -> Result<()> {
        let Some(script) = &self.config.init_script else {
            return Ok(());
        };
        let dest = dir.join(INIT_SCRIPT);
        if dest.exists() {
            return Ok(());
        }
        let source = self.config.resolve(script);
        if !source.is_file() {
            return Err(PipelineError::MissingInput(source));
        }
        fs::copy(&source, &dest)?;
        debug!("Copied {} to {}", source.display(), dir.display());
        Ok(())
    }

    /// Coupling job and post-processor inside `dir`.
    ///
    /// The stage only succeeds once the post-processor's output parses. An
    /// existing output that does not parse is discarded and regenerated.
    fn coupling_stage(&self, dir: &Path, content: &str, interrupted: bool) -> Result<()> {
        fs::create_dir_all(dir)?;
        let input_path = dir.join(COUPLING_INPUT);
        let log = log_path(&input_path, &self.config.log_extension);
        if !is_complete(&log, &self.parser) {
            input::write_input(&input_path, content)?;
        }
        self.copy_init_script(dir)?;
        self.engine_stage(&input_path, &log, interrupted)?;

        let output = dir.join(&self.config.coupling_output);
        if interrupted && output.exists() {
            fs::remove_file(&output)?;
        }
        if non_empty(&output) {
            match self.read_couplings(&output) {
                Ok(()) => {
                    info!("{} already present, skipping post-processor", output.display());
                    return Ok(());
                }
                Err(e) => {
                    warn!("Discarding unreadable {}: {}", output.display(), e);
                    fs::remove_file(&output)?;
                }
            }
        }

        let invocation = coupling_invocation(&self.config.coupling_command, dir, self.config.timeout);
        let command = invocation.command_line();
        let result = self.invoke(invocation)?;
        if !non_empty(&output) {
            return Err(PipelineError::ExternalProcess {
                command,
                code: result.code,
                detail: format!("no {} was produced", self.config.coupling_output),
            });
        }
        self.read_couplings(&output)?;
        info!("Coupling post-processing finished in {}", dir.display());
        Ok(())
    }

    fn read_couplings(&self, output: &Path) -> Result<()> {
        let table = self.parser.couplings(&read_log(output)?)?;
        debug!("{}: {} coupling elements", output.display(), table.len());
        Ok(())
    }

    /// Scratch removal after a finished coupling stage.
    fn clean_coupling_dir(&self, dir: &Path) -> Result<()> {
        if self.config.cleanup_after_coupling {
            CleanupManager::new(self.config.cleanup.clone()).cleanup_directory(dir)?;
        }
        Ok(())
    }

    fn distorted_geometry(&self, ctx: &UnitContext, block: &DistortionBlock) -> Result<Geometry> {
        let text = read_log(&ctx.block_log())?;
        let records = self.parser.distortions(&text)?;
        let record = match records.iter().find(|r| r.key == ctx.key) {
            Some(r) => r,
            None => {
                let first = records
                    .first()
                    .ok_or_else(|| ParseError::MissingMarker(format!("distortion {}", ctx.key)))?;
                warn!(
                    "{} names distortion {} instead of {}, using it",
                    ctx.block_log().display(),
                    first.key,
                    ctx.key
                );
                first
            }
        };

        let reference = input::template_geometry(&block.content)?;
        reference.ensure_same_shape(&record.geometry)?;
        debug!(
            "{}: RMS displacement from block input {:.5} A",
            ctx.name(),
            reference.rms_displacement(&record.geometry)?
        );
        Ok(record.geometry.clone())
    }

    fn energy_stage(&self, ctx: &UnitContext, geometry: &Geometry, interrupted: bool) -> Result<()> {
        let job = energy_job_name(&ctx.key);
        let pattern = format!("{}.*", job);
        let filed_log = ctx.energy_log();

        if filed_log.exists() {
            verify_completion(&filed_log, &self.parser)?;
            self.move_matching(&ctx.stage_dir, &pattern, &ctx.vee_dir())?;
            info!("{} already complete, skipping", filed_log.display());
            return Ok(());
        }

        let input_path = ctx.energy_input();
        let log = log_path(&input_path, &self.config.log_extension);
        if !is_complete(&log, &self.parser) {
            let content = input::render_energy_input(
                &job,
                self.config.energy_window,
                geometry,
                &self.config.resources,
            );
            input::write_input(&input_path, &content)?;
        }
        self.engine_stage(&input_path, &log, interrupted)?;

        let moved = self.move_matching(&ctx.stage_dir, &pattern, &ctx.vee_dir())?;
        debug!("Filed {} files of {} into {}", moved, job, ctx.vee_dir().display());
        Ok(())
    }

    fn write_block(&self, ctx: &UnitContext, block: &DistortionBlock) -> Result<()> {
        let path = ctx.block_input();
        if fs::read_to_string(&path).map_or(false, |c| c == block.content) {
            return Ok(());
        }
        input::write_input(&path, &block.content)?;
        Ok(())
    }

    fn unit_stages(
        &self,
        ctx: &UnitContext,
        block: &DistortionBlock,
        status: &mut StatusFile,
        resumed: UnitStage,
    ) -> Result<()> {
        self.write_block(ctx, block)?;
        status.reach(UnitStage::Running)?;
        self.engine_stage(&ctx.block_input(), &ctx.block_log(), resumed == UnitStage::Running)?;
        status.reach(UnitStage::Complete)?;

        let geometry = self.distorted_geometry(ctx, block)?;
        status.reach(UnitStage::GeometryExtracted)?;

        status.reach(UnitStage::EnergyPending)?;
        self.energy_stage(ctx, &geometry, resumed == UnitStage::EnergyPending)?;
        status.reach(UnitStage::EnergyComplete)?;

        status.reach(UnitStage::CouplingPending)?;
        let content = input::render_coupling_input(
            &coupling_dir_name(&ctx.key),
            &geometry,
            &self.config.resources,
        );
        self.coupling_stage(
            &ctx.coupling_dir(),
            &content,
            resumed == UnitStage::CouplingPending,
        )?;
        status.reach(UnitStage::CouplingComplete)?;
        self.clean_coupling_dir(&ctx.coupling_dir())
    }

    /// Takes one unit through every stage, recording progress.
    pub fn process_unit(&self, ctx: &UnitContext, block: &DistortionBlock) -> Result<()> {
        let mut status = StatusFile::open(&ctx.status_path(), &ctx.name(), &ctx.key.to_string())?;
        let resumed = status.stage();
        if resumed == UnitStage::Failed {
            info!(
                "Retrying {} (failed at {:?}: {})",
                ctx.name(),
                status.status().failed_at,
                status.status().error.as_deref().unwrap_or("unknown error")
            );
            status.restart()?;
        } else if resumed.is_in_flight() {
            warn!("{} was interrupted during {}", ctx.name(), resumed);
        }

        match self.unit_stages(ctx, block, &mut status, resumed) {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(save) = status.fail(&e) {
                    warn!("Could not record failure of {}: {}", ctx.name(), save);
                }
                Err(e)
            }
        }
    }

    /// Runs the distortion tool unless its output files already exist.
    ///
    /// Returns the output files, sorted by name.
    pub fn prepare_distortion_outputs(&self) -> Result<Vec<PathBuf>> {
        let cfg = &self.config;
        let pattern = pattern_regex(&cfg.output_pattern)?;
        let existing = matching_entries(&cfg.root, &pattern, false)?;
        if !existing.is_empty() {
            info!(
                "Found {} distortion output file(s), skipping distortion tool",
                existing.len()
            );
            return Ok(existing);
        }

        let source = cfg.resolve(&cfg.distortion_source);
        if !source.is_file() {
            return Err(PipelineError::MissingInput(source));
        }
        let stdin = cfg.resolve(&cfg.distortion_input);
        if !stdin.is_file() {
            return Err(PipelineError::MissingInput(stdin));
        }

        // The tools run inside root, so every path handed to them is absolute.
        let root = fs::canonicalize(&cfg.root)?;
        let source = fs::canonicalize(&source)?;
        let stdin = fs::canonicalize(&stdin)?;
        let exe = root.join(DISTORTION_EXE);

        info!("Compiling {}", source.display());
        self.invoke(compile_invocation(&cfg.compiler, &source, &exe, &root))?;
        info!("Running distortion tool");
        self.invoke(tool_invocation(&exe, &stdin, &root, cfg.timeout))?;

        let produced = matching_entries(&cfg.root, &pattern, false)?;
        if produced.is_empty() {
            return Err(PipelineError::NoDistortionOutput {
                pattern: cfg.output_pattern.clone(),
                dir: cfg.root.clone(),
            });
        }
        Ok(produced)
    }

    /// Runs the whole distortion batch.
    pub fn run_distortion_batch(&self) -> Result<BatchSummary> {
        let cfg = &self.config;
        let stage = cfg.stage_path();
        fs::create_dir_all(&stage)?;
        if cfg.modes.is_empty() {
            warn!("No active modes configured, nothing to distort");
        }

        let outputs = self.prepare_distortion_outputs()?;
        let mut summary = BatchSummary::default();

        for file in &outputs {
            info!("Processing distortion output {}", file.display());
            let text = read_log(file)?;
            let naming = FileNaming::new(file);

            for &mode in &cfg.modes {
                let blocks = split_distortion_blocks(&text, mode)?;
                if blocks.is_empty() {
                    warn!("No distortions of mode {} in {}", mode, file.display());
                    continue;
                }

                for block in &blocks {
                    let ctx = UnitContext::new(block.key.clone(), naming.clone(), cfg);
                    info!("Unit {}", ctx.name());
                    match self.process_unit(&ctx, block) {
                        Ok(()) => summary.completed.push(ctx.name()),
                        Err(e) => {
                            error!("Unit {} failed: {}", ctx.name(), e);
                            if !cfg.continue_on_failure {
                                return Err(PipelineError::Aborted {
                                    unit: ctx.name(),
                                    reason: e.to_string(),
                                });
                            }
                            summary.failed.push((ctx.name(), e.to_string()));
                        }
                    }
                }
            }
        }

        summary.tables = self.write_tables()?;
        info!(
            "Distortion batch finished: {} complete, {} failed",
            summary.completed.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Rebuilds the SOC-vs-distortion tables from the coupling directories.
    pub fn write_tables(&self) -> Result<Vec<PathBuf>> {
        let cfg = &self.config;
        Ok(report::write_mode_tables(
            &cfg.stage_path(),
            &cfg.modes,
            &cfg.coupling_output,
            cfg.report_singlets,
            &self.parser,
        )?)
    }

    /// Runs the single-molecule workflow for an opt+freq input.
    ///
    /// The energy and coupling inputs reuse the input's trailer (connectivity,
    /// basis sections) with a fresh preamble and the optimized geometry.
    pub fn run_molecule(&self, input_file: &Path) -> Result<MoleculeOutcome> {
        let cfg = &self.config;
        let input_path = cfg.resolve(input_file);
        if !input_path.is_file() {
            return Err(PipelineError::MissingInput(input_path));
        }
        let template = fs::read_to_string(&input_path)?;
        let reference = input::template_geometry(&template)?;
        let dir = input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cfg.root.clone());

        info!("Running opt+freq for {}", input_path.display());
        let opt_log = log_path(&input_path, &cfg.log_extension);
        self.engine_stage(&input_path, &opt_log, false)?;

        let geometry = self.parser.geometry(&read_log(&opt_log)?)?;
        reference.ensure_same_shape(&geometry)?;
        info!(
            "Optimized geometry: {} atoms, RMS displacement {:.4} A, max {:.4} A",
            geometry.num_atoms(),
            reference.rms_displacement(&geometry)?,
            reference.max_displacement(&geometry)?
        );

        let naming = FileNaming::new(&input_path);
        let energy_input = dir.join(naming.state_energy_input());
        let energy_name = energy_input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let energy_log = log_path(&energy_input, &cfg.log_extension);
        if !is_complete(&energy_log, &self.parser) {
            let preamble = input::energy_preamble(&energy_name, StateWindow::Mixed, &cfg.resources);
            let content = input::with_preamble(&template, &preamble, &geometry)?;
            input::write_input(&energy_input, &content)?;
        }
        info!("Running excited-state energies");
        self.engine_stage(&energy_input, &energy_log, false)?;

        info!("Running spin-orbit coupling");
        let coupling_dir = dir.join(naming.coupling_dir());
        let preamble = input::coupling_preamble(naming.basename(), &cfg.resources);
        let coupling = input::with_preamble(&template, &preamble, &geometry)?;
        self.coupling_stage(&coupling_dir, &coupling, false)?;
        self.clean_coupling_dir(&coupling_dir)?;

        let inputs = rate::load_inputs(
            &self.parser,
            &energy_log,
            &energy_log,
            &coupling_dir.join(&cfg.coupling_output),
        )?;
        let rates = rate::isc_rates(&inputs.couplings, &inputs.states, &cfg.rate);
        let report_path = cfg.root.join(RESULTS_FILE);
        report::write_rate_report(&report_path, &inputs, &rates, cfg.top_transitions)?;

        Ok(MoleculeOutcome {
            geometry,
            report: report_path,
            rates,
        })
    }
}

fn non_empty(path: &Path) -> bool {
    fs::metadata(path).map_or(false, |m| m.is_file() && m.len() > 0)
}
