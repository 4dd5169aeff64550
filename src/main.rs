use kisc::cleanup::CleanupManager;
use kisc::naming::{FileNaming, RESULTS_FILE};
use kisc::parser::GaussianLogParser;
use kisc::pipeline::Pipeline;
use kisc::rate;
use kisc::report;
use kisc::runner::SystemRunner;
use kisc::settings::{SettingsManager, CONFIG_FILE};
use log::{error, info, warn};
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Main entry point for kisc.
///
/// Loads settings, initializes the logger and dispatches to the subcommand.
/// Exits with code 1 when a subcommand fails or a distortion batch has
/// failed units.
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    check_help_flags(&args);

    let command = args[1].as_str();
    let rest = &args[2..];

    let outcome = match command {
        "ci" => run_create_settings_template(rest),
        "distort" => with_settings(command, config_arg(rest, 0), run_distort),
        "molecule" => match rest.first() {
            Some(input) => {
                let input = PathBuf::from(input);
                with_settings(&input.to_string_lossy(), config_arg(rest, 1), |m| {
                    run_molecule(m, &input)
                })
            }
            None => Err("Missing input file. Usage: kisc molecule <input.com> [config]".into()),
        },
        "rate" => run_rate_command(rest),
        "report" => with_settings(command, config_arg(rest, 0), run_report),
        "cleanup" => with_settings(command, config_arg(rest, 0), run_cleanup),
        _ => {
            eprintln!("Error: Unknown command: {}", command);
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = outcome {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Check for help flags and print appropriate help
fn check_help_flags(args: &[String]) {
    use kisc::help::*;

    if args[1] == "--help" || args[1] == "-h" {
        match args.get(2).map(String::as_str) {
            Some("keywords") => print_keyword_help(),
            Some("workflow") => print_workflow_help(),
            _ => print_global_help(),
        }
        process::exit(0);
    }

    if args.len() >= 3 && (args[2] == "--help" || args[2] == "-h") {
        if args[1] == "ci" {
            print_ci_help();
        } else {
            print_global_help();
        }
        process::exit(0);
    }
}

/// Prints usage information to stderr.
fn print_usage(program_name: &str) {
    eprintln!("kisc - Intersystem-crossing workflows on top of Gaussian");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {} distort [config]", program_name);
    eprintln!("  {} molecule <input.com> [config]", program_name);
    eprintln!(
        "  {} rate <singlet.log> <triplet.log> <soc_out.dat> [results.out] [config]",
        program_name
    );
    eprintln!("  {} report [config]", program_name);
    eprintln!("  {} cleanup [config]", program_name);
    eprintln!("  {} ci {}", program_name, CONFIG_FILE);
    eprintln!();
    eprintln!("Run '{} --help' for details.", program_name);
}

fn config_arg(rest: &[String], index: usize) -> Option<PathBuf> {
    rest.get(index).map(PathBuf::from)
}

/// Loads settings, sets up logging and runs `body`.
///
/// `job` names the debug log when file logging is enabled.
fn with_settings<F>(job: &str, config: Option<PathBuf>, body: F) -> CliResult<()>
where
    F: FnOnce(&SettingsManager) -> CliResult<()>,
{
    let manager = SettingsManager::load(config.as_deref())?;
    init_logging(&manager, job)?;
    info!("Configuration loaded from: {}", manager.config_source());
    body(&manager)
}

fn init_logging(manager: &SettingsManager, job: &str) -> CliResult<()> {
    let logging = manager.logging();
    let level = log::LevelFilter::from_str(&logging.level).unwrap_or_else(|_| {
        eprintln!(
            "Warning: unknown log level '{}', using info",
            logging.level
        );
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::from_default_env();
    if env::var_os("RUST_LOG").is_none() {
        builder.filter_level(level);
    }
    builder.format_timestamp_millis();

    if logging.file_logging {
        let log_name = FileNaming::new(Path::new(job)).debug_log();
        let file = File::create(&log_name)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
        println!("Logging to {}", log_name);
    } else {
        builder.target(env_logger::Target::Stdout);
    }

    builder.try_init()?;
    Ok(())
}

/// Writes a settings template, refusing to overwrite an existing file.
fn run_create_settings_template(rest: &[String]) -> CliResult<()> {
    let target = rest.first().map(String::as_str).unwrap_or(CONFIG_FILE);
    if Path::new(target).file_name().and_then(|n| n.to_str()) != Some(CONFIG_FILE) {
        return Err(format!("Usage: kisc ci {}", CONFIG_FILE).into());
    }

    let settings_path = Path::new(target);
    if settings_path.exists() {
        return Err(format!(
            "{} already exists. Please remove it first or choose a different location.",
            settings_path.display()
        )
        .into());
    }

    SettingsManager::create_template(settings_path)?;
    println!("✓ Settings template created successfully!");
    println!("  Output file: {}", settings_path.display());
    println!("\nNext steps:");
    println!("  1. Set [distortion] modes and [coupling] init_script");
    println!("  2. Adjust resources and the level of theory");
    println!("  3. Run: kisc distort");
    Ok(())
}

fn run_distort(manager: &SettingsManager) -> CliResult<()> {
    let config = manager.settings().workflow_config()?;
    info!(
        "Distortion batch in {} over modes {:?}",
        config.root.display(),
        config.modes
    );
    let pipeline = Pipeline::new(config, SystemRunner);
    let summary = pipeline.run_distortion_batch()?;

    println!(
        "\n{} unit(s) complete, {} failed",
        summary.completed.len(),
        summary.failed.len()
    );
    for table in &summary.tables {
        println!("  table: {}", table.display());
    }
    if !summary.is_success() {
        for (unit, reason) in &summary.failed {
            eprintln!("  FAILED {}: {}", unit, reason);
        }
        return Err(format!("{} unit(s) failed", summary.failed.len()).into());
    }
    Ok(())
}

fn run_molecule(manager: &SettingsManager, input: &Path) -> CliResult<()> {
    let config = manager.settings().workflow_config()?;
    let pipeline = Pipeline::new(config, SystemRunner);
    let outcome = pipeline.run_molecule(input)?;

    if !outcome.rates.skipped.is_empty() {
        warn!(
            "{} transition(s) had no energy gap",
            outcome.rates.skipped.len()
        );
    }
    println!("Results are saved in {}", outcome.report.display());
    Ok(())
}

/// `rate <singlet.log> <triplet.log> <soc_out.dat> [results.out] [config]`
///
/// A fourth argument ending in `.cfg` is taken as the configuration file.
fn run_rate_command(rest: &[String]) -> CliResult<()> {
    if rest.len() < 3 {
        return Err(
            "Usage: kisc rate <singlet.log> <triplet.log> <soc_out.dat> [results.out] [config]"
                .into(),
        );
    }
    let (output, config) = match rest.get(3) {
        Some(arg) if arg.ends_with(".cfg") => (None, Some(PathBuf::from(arg))),
        Some(arg) => (Some(PathBuf::from(arg)), config_arg(rest, 4)),
        None => (None, None),
    };

    with_settings("rate", config, |manager| {
        let singlet_log = Path::new(&rest[0]);
        let triplet_log = Path::new(&rest[1]);
        let coupling_file = Path::new(&rest[2]);
        let settings = manager.settings();

        let parser = GaussianLogParser::new(settings.engine.termination_phrase.clone());
        let inputs = rate::load_inputs(&parser, singlet_log, triplet_log, coupling_file)?;
        let result = rate::isc_rates(&inputs.couplings, &inputs.states, &settings.rate_parameters());

        let output = output.unwrap_or_else(|| PathBuf::from(RESULTS_FILE));
        report::write_rate_report(&output, &inputs, &result, settings.rate.top_transitions)?;
        println!("Results are saved in {}", output.display());
        Ok(())
    })
}

fn run_report(manager: &SettingsManager) -> CliResult<()> {
    let config = manager.settings().workflow_config()?;
    let pipeline = Pipeline::new(config, SystemRunner);
    let tables = pipeline.write_tables()?;
    if tables.is_empty() {
        warn!("No tables written; check [distortion] modes and the stage directory");
    }
    for table in &tables {
        println!("  table: {}", table.display());
    }
    Ok(())
}

fn run_cleanup(manager: &SettingsManager) -> CliResult<()> {
    let config = manager.settings().workflow_config()?;
    let stage = config.stage_path();
    let summary = CleanupManager::new(config.cleanup).cleanup_stage(&stage)?;
    println!(
        "Removed {} file(s), {:.1} MB freed",
        summary.removed.len(),
        summary.bytes_freed as f64 / 1_048_576.0
    );
    if summary.errors > 0 {
        return Err(format!("{} file(s) could not be removed", summary.errors).into());
    }
    Ok(())
}
