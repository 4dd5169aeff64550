//! Blocking execution of external programs.
//!
//! Three kinds of external programs take part in the workflow: the
//! quantum-chemistry engine, the spin-orbit coupling post-processor and the
//! distortion tool (compiled from source, then run with a redirected input
//! file). All are opaque; this module only launches them, waits, and reports
//! how they exited.
//!
//! A non-zero exit status is not an error at this level: [`ProcessRunner::run`]
//! returns a [`ProcessOutput`] with `success == false` and the captured
//! output, and the caller decides what to do. Only failures to launch the
//! program and timeouts are errors.
//!
//! Whether an engine log may be consumed by the next stage is decided
//! separately by [`verify_completion`].

use crate::parser::{read_log, LogParser};
use log::{debug, info, warn};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors raised while running programs or checking their output.
#[derive(Error, Debug)]
pub enum RunError {
    /// The program could not be started
    #[error("failed to start '{command}': {source}")]
    Spawn {
        /// Command line that failed
        command: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// File system error while preparing or supervising a run
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The program ran longer than allowed and was killed
    #[error("'{command}' exceeded the time limit of {limit:?} and was killed")]
    Timeout {
        /// Command line that timed out
        command: String,
        /// The limit that was exceeded
        limit: Duration,
    },
    /// The log exists but does not end with the normal-termination line
    #[error("incomplete calculation: {path} does not end with a normal termination")]
    IncompleteCalculation {
        /// The log that failed verification
        path: PathBuf,
    },
    /// The log could not be read for verification
    #[error("cannot verify {path}: {reason}")]
    Unreadable {
        /// Log path
        path: PathBuf,
        /// Read failure
        reason: String,
    },
}

/// Type alias for runner results
pub type Result<T> = std::result::Result<T, RunError>;

/// A fully described external program invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Executable name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Directory the program runs in
    pub working_dir: PathBuf,
    /// File connected to the program's standard input
    pub stdin_file: Option<PathBuf>,
    /// Wall-clock limit; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Invocation of `program` inside `working_dir` with no arguments.
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            stdin_file: None,
            timeout: None,
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Redirects standard input from a file.
    pub fn stdin(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }

    /// Sets the wall-clock limit.
    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Human-readable command line for diagnostics.
    pub fn command_line(&self) -> String {
        let mut s = self.program.clone();
        for a in &self.args {
            s.push(' ');
            s.push_str(a);
        }
        if let Some(stdin) = &self.stdin_file {
            s.push_str(&format!(" < {}", stdin.display()));
        }
        s
    }
}

/// Exit status and captured output of a finished program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// True for a zero exit status
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessOutput {
    /// Successful output with nothing captured.
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            success: true,
            ..Self::default()
        }
    }

    /// Failed output with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Last few lines of stderr (or stdout when stderr is empty).
    pub fn tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let all: Vec<&str> = source.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

/// Something that can run an [`Invocation`] to completion.
///
/// The pipeline only talks to external programs through this trait, so tests
/// substitute a recording stub.
pub trait ProcessRunner {
    /// Runs the invocation and blocks until it exits.
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput>;
}

/// Runs programs as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

fn drain<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut s) = source {
            let _ = s.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let command_line = invocation.command_line();
        info!(
            "Running '{}' in {}",
            command_line,
            invocation.working_dir.display()
        );

        let stdin = match &invocation.stdin_file {
            Some(path) => Stdio::from(File::open(invocation.working_dir.join(path))?),
            None => Stdio::null(),
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        // Pipes are drained on their own threads so a chatty child cannot
        // block on a full pipe while we poll for its exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(limit) = invocation.timeout {
                if started.elapsed() >= limit {
                    warn!("'{}' exceeded {:?}, killing it", command_line, limit);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RunError::Timeout {
                        command: command_line,
                        limit,
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = ProcessOutput {
            code: status.code(),
            success: status.success(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };
        debug!(
            "'{}' exited with {:?} after {:.1}s",
            command_line,
            output.code,
            started.elapsed().as_secs_f64()
        );
        Ok(output)
    }
}

/// Engine run: `<engine> <input file name>` inside the input's directory.
pub fn engine_invocation(engine: &str, input: &Path, timeout: Option<Duration>) -> Invocation {
    let dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Invocation::new(engine, dir).arg(name).timeout(timeout)
}

/// Coupling post-processor run: no arguments, inside the coupling directory.
pub fn coupling_invocation(program: &str, dir: &Path, timeout: Option<Duration>) -> Invocation {
    Invocation::new(program, dir).timeout(timeout)
}

/// Compilation of the distortion tool: `<compiler> <source> -o <exe>`.
pub fn compile_invocation(compiler: &str, source: &Path, exe: &Path, dir: &Path) -> Invocation {
    Invocation::new(compiler, dir)
        .arg(source.to_string_lossy())
        .arg("-o")
        .arg(exe.to_string_lossy())
}

/// Distortion tool run with its input file on stdin.
pub fn tool_invocation(exe: &Path, stdin: &Path, dir: &Path, timeout: Option<Duration>) -> Invocation {
    Invocation::new(exe.to_string_lossy(), dir)
        .stdin(stdin)
        .timeout(timeout)
}

/// Checks that an engine log finished normally.
///
/// A log is complete iff its last non-empty line is the engine's
/// normal-termination line. Anything else, including an empty file, is an
/// [`RunError::IncompleteCalculation`]: a partial log must never be handed to
/// the next stage.
pub fn verify_completion(log: &Path, parser: &dyn LogParser) -> Result<()> {
    let text = read_log(log).map_err(|e| RunError::Unreadable {
        path: log.to_path_buf(),
        reason: e.to_string(),
    })?;
    let last = text.lines().rev().find(|l| !l.trim().is_empty());
    match last {
        Some(line) if parser.is_normal_termination(line) => {
            debug!("{} terminated normally", log.display());
            Ok(())
        }
        _ => Err(RunError::IncompleteCalculation {
            path: log.to_path_buf(),
        }),
    }
}

/// Like [`verify_completion`] but answers with a bool.
pub fn is_complete(log: &Path, parser: &dyn LogParser) -> bool {
    verify_completion(log, parser).is_ok()
}
