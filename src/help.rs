//! Built-in help for kisc
//!
//! Documents the subcommands and every configuration keyword, grouped by the
//! INI section it belongs to.

/// Section of `kisc_config.cfg` a keyword lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigSection {
    /// `[engine]`
    Engine,
    /// `[resources]`
    Resources,
    /// `[calculation]`
    Calculation,
    /// `[distortion]`
    Distortion,
    /// `[coupling]`
    Coupling,
    /// `[rate]`
    Rate,
    /// `[workflow]`
    Workflow,
    /// `[logging]`
    Logging,
    /// `[cleanup]`
    Cleanup,
}

impl ConfigSection {
    /// All sections in template order.
    pub const ALL: [ConfigSection; 9] = [
        ConfigSection::Engine,
        ConfigSection::Resources,
        ConfigSection::Calculation,
        ConfigSection::Distortion,
        ConfigSection::Coupling,
        ConfigSection::Rate,
        ConfigSection::Workflow,
        ConfigSection::Logging,
        ConfigSection::Cleanup,
    ];

    /// Section name as written in the INI file.
    pub fn name(self) -> &'static str {
        match self {
            ConfigSection::Engine => "engine",
            ConfigSection::Resources => "resources",
            ConfigSection::Calculation => "calculation",
            ConfigSection::Distortion => "distortion",
            ConfigSection::Coupling => "coupling",
            ConfigSection::Rate => "rate",
            ConfigSection::Workflow => "workflow",
            ConfigSection::Logging => "logging",
            ConfigSection::Cleanup => "cleanup",
        }
    }
}

/// Documentation entry for a single configuration keyword.
#[derive(Debug, Clone)]
pub struct Keyword {
    /// Key name inside its section
    pub name: &'static str,
    /// Section the key belongs to
    pub section: ConfigSection,
    /// What the key controls
    pub description: &'static str,
    /// Built-in default, if any
    pub default_value: Option<&'static str>,
    /// Example line
    pub example: Option<&'static str>,
}

/// All keyword documentation
pub const KEYWORDS: &[Keyword] = &[
    Keyword {
        name: "command",
        section: ConfigSection::Engine,
        description: "Gaussian executable, started with the input file name in the input's directory",
        default_value: Some("g16"),
        example: Some("command = g09"),
    },
    Keyword {
        name: "log_extension",
        section: ConfigSection::Engine,
        description: "Extension of the logs the engine writes next to each input",
        default_value: Some("log"),
        example: Some("log_extension = out"),
    },
    Keyword {
        name: "termination_phrase",
        section: ConfigSection::Engine,
        description: "Text that must appear on the last non-empty line of a finished log",
        default_value: Some("Normal termination of Gaussian"),
        example: None,
    },
    Keyword {
        name: "cores",
        section: ConfigSection::Resources,
        description: "Written as %nprocshared into every generated input",
        default_value: Some("4"),
        example: Some("cores = 25"),
    },
    Keyword {
        name: "memory_gb",
        section: ConfigSection::Resources,
        description: "Written as %mem (in GB) into every generated input",
        default_value: Some("4"),
        example: Some("memory_gb = 60"),
    },
    Keyword {
        name: "charge",
        section: ConfigSection::Resources,
        description: "Molecular charge of generated inputs",
        default_value: Some("0"),
        example: Some("charge = 1"),
    },
    Keyword {
        name: "multiplicity",
        section: ConfigSection::Resources,
        description: "Spin multiplicity of the reference state",
        default_value: Some("1"),
        example: None,
    },
    Keyword {
        name: "method_basis",
        section: ConfigSection::Calculation,
        description: "Method and basis set of energy and coupling jobs",
        default_value: Some("b3lyp/6-31g(d)"),
        example: Some("method_basis = b3lyp/6-311++g"),
    },
    Keyword {
        name: "nstates",
        section: ConfigSection::Calculation,
        description: "Number of TD-DFT states",
        default_value: Some("10"),
        example: Some("nstates = 20"),
    },
    Keyword {
        name: "energy_window",
        section: ConfigSection::Calculation,
        description: "State window of distortion energy jobs: singlets, triplets or 50-50",
        default_value: Some("singlets"),
        example: Some("energy_window = 50-50"),
    },
    Keyword {
        name: "source",
        section: ConfigSection::Distortion,
        description: "Source of the distortion tool, compiled once per batch",
        default_value: Some("distort.f90"),
        example: None,
    },
    Keyword {
        name: "compiler",
        section: ConfigSection::Distortion,
        description: "Compiler used for the distortion tool",
        default_value: Some("gfortran"),
        example: Some("compiler = ifort"),
    },
    Keyword {
        name: "input",
        section: ConfigSection::Distortion,
        description: "File redirected to the distortion tool's standard input",
        default_value: Some("inp_sing.txt"),
        example: None,
    },
    Keyword {
        name: "output_pattern",
        section: ConfigSection::Distortion,
        description: "Pattern of the distortion tool's output files; present files skip the tool",
        default_value: Some("*dist_sing*"),
        example: None,
    },
    Keyword {
        name: "modes",
        section: ConfigSection::Distortion,
        description: "Active normal modes, as a list with ranges",
        default_value: None,
        example: Some("modes = 1-10,75,83"),
    },
    Keyword {
        name: "command",
        section: ConfigSection::Coupling,
        description: "SOC post-processor, run without arguments inside each coupling directory",
        default_value: Some("pysoc.py"),
        example: None,
    },
    Keyword {
        name: "output_file",
        section: ConfigSection::Coupling,
        description: "File the post-processor writes; non-empty means the stage is done",
        default_value: Some("soc_out.dat"),
        example: None,
    },
    Keyword {
        name: "init_script",
        section: ConfigSection::Coupling,
        description: "Post-processor configuration copied into each coupling directory",
        default_value: None,
        example: Some("init_script = /home/user/pysoc/init.py"),
    },
    Keyword {
        name: "reorganization_energy",
        section: ConfigSection::Rate,
        description: "Reorganization energy λ in eV",
        default_value: Some("0.2"),
        example: None,
    },
    Keyword {
        name: "temperature",
        section: ConfigSection::Rate,
        description: "Temperature in K",
        default_value: Some("300"),
        example: Some("temperature = 77"),
    },
    Keyword {
        name: "top_transitions",
        section: ConfigSection::Rate,
        description: "Strongest couplings listed at the end of rate reports (0 disables)",
        default_value: Some("5"),
        example: None,
    },
    Keyword {
        name: "report_singlets",
        section: ConfigSection::Rate,
        description: "Highest singlet shown in SOC-vs-distortion tables",
        default_value: Some("6"),
        example: None,
    },
    Keyword {
        name: "root",
        section: ConfigSection::Workflow,
        description: "Run directory; other relative paths are taken relative to it",
        default_value: Some("."),
        example: Some("root = /scratch/benzo"),
    },
    Keyword {
        name: "stage_dir",
        section: ConfigSection::Workflow,
        description: "Directory of distortion units under the run directory",
        default_value: Some("singlets"),
        example: None,
    },
    Keyword {
        name: "timeout_hours",
        section: ConfigSection::Workflow,
        description: "Wall-clock limit per external program; 0 disables it",
        default_value: Some("48"),
        example: Some("timeout_hours = 12"),
    },
    Keyword {
        name: "continue_on_failure",
        section: ConfigSection::Workflow,
        description: "Move on to the next unit after a failure instead of aborting",
        default_value: Some("true"),
        example: None,
    },
    Keyword {
        name: "level",
        section: ConfigSection::Logging,
        description: "Log level: debug, info, warn or error (RUST_LOG overrides)",
        default_value: Some("info"),
        example: Some("level = debug"),
    },
    Keyword {
        name: "file_logging",
        section: ConfigSection::Logging,
        description: "Send log output to kisc_debug_<input>.log",
        default_value: Some("false"),
        example: None,
    },
    Keyword {
        name: "print_level",
        section: ConfigSection::Logging,
        description: "0 = quiet, 1 = normal, 2 = verbose file operations",
        default_value: Some("1"),
        example: None,
    },
    Keyword {
        name: "enabled",
        section: ConfigSection::Cleanup,
        description: "Allow removal of engine scratch files",
        default_value: Some("true"),
        example: None,
    },
    Keyword {
        name: "after_coupling",
        section: ConfigSection::Cleanup,
        description: "Clean each coupling directory as soon as its post-processor finishes",
        default_value: Some("false"),
        example: None,
    },
    Keyword {
        name: "scratch_files",
        section: ConfigSection::Cleanup,
        description: "Scratch file names, comma-separated",
        default_value: Some("gaussian.chk, gaussian.rwf"),
        example: None,
    },
    Keyword {
        name: "dir_pattern",
        section: ConfigSection::Cleanup,
        description: "Coupling directories inside the stage directory",
        default_value: Some("*soc_dis*"),
        example: None,
    },
    Keyword {
        name: "verbose",
        section: ConfigSection::Cleanup,
        description: "0 = quiet, 1 = normal, 2 = verbose",
        default_value: Some("1"),
        example: None,
    },
];

/// Keywords of one section.
pub fn keywords_in(section: ConfigSection) -> impl Iterator<Item = &'static Keyword> {
    KEYWORDS.iter().filter(move |k| k.section == section)
}

/// Print global help
pub fn print_global_help() {
    println!("kisc - Intersystem-crossing workflows on top of Gaussian");
    println!();
    println!("USAGE:");
    println!("    kisc <COMMAND> [ARGS] [config]");
    println!();
    println!("COMMANDS:");
    println!("    distort [config]");
    println!("                        Run the normal-mode distortion batch");
    println!();
    println!("    molecule <input.com> [config]");
    println!("                        opt+freq, excited states, SOC and k_ISC for one molecule");
    println!();
    println!("    rate <singlet.log> <triplet.log> <soc_out.dat> [results.out] [config]");
    println!("                        k_ISC from existing logs");
    println!();
    println!("    report [config]");
    println!("                        Rebuild the SOC-vs-distortion tables");
    println!();
    println!("    cleanup [config]");
    println!("                        Remove engine scratch files from coupling directories");
    println!();
    println!("    ci kisc_config.cfg");
    println!("                        Create a configuration template file");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help [topic]   Show help. Topics: keywords, workflow");
    println!();
    println!("CONFIGURATION FILE:");
    println!("    Supported locations, later ones overriding single values:");
    println!("      - /etc/kisc/kisc_config.cfg (system)");
    println!("      - ~/.config/kisc/kisc_config.cfg (user)");
    println!("      - ./kisc_config.cfg (local)");
    println!("      - a file given as the last argument (highest priority)");
    println!();
    println!("EXAMPLES:");
    println!("    Create settings:     kisc ci kisc_config.cfg");
    println!("    Distortion batch:    kisc distort > distort.out");
    println!("    One molecule:        kisc molecule benzo.com");
    println!("    Rates only:          kisc rate s.log t.log soc_out.dat");
    println!();
}

/// Print help for 'ci' command
pub fn print_ci_help() {
    println!("Create Settings Template (ci) Command");
    println!("═════════════════════════════════════");
    println!();
    println!("USAGE:");
    println!("    kisc ci kisc_config.cfg");
    println!();
    println!("DESCRIPTION:");
    println!("    Writes a commented kisc_config.cfg with every option at its default.");
    println!("    An existing file is never overwritten.");
    println!();
}

/// Print keyword reference
pub fn print_keyword_help() {
    println!("KEYWORD REFERENCE");
    println!("═══════════════════════════════════════════════════════════════════════");
    println!();

    for section in ConfigSection::ALL {
        println!("[{}]", section.name());
        println!("{}", "─".repeat(76));
        for keyword in keywords_in(section) {
            print_keyword(keyword);
            println!();
        }
        println!();
    }
}

/// Print an overview of the distortion workflow
pub fn print_workflow_help() {
    println!("DISTORTION WORKFLOW");
    println!("═══════════════════════════════════════════════════════════════════════");
    println!();
    println!("  1. The distortion tool is compiled and run unless its output files exist.");
    println!("  2. Each output file is cut into one job per (mode, amplitude) unit.");
    println!("  3. Every unit goes through:");
    println!("       block run → geometry → excitation energies (VEE<amp>/)");
    println!("       → SOC job and post-processor (soc_dis_<mode>_<amp>/)");
    println!("  4. SOC-vs-distortion tables are written per mode.");
    println!();
    println!("RESUMING:");
    println!("  Re-running the same command skips every stage whose log is complete.");
    println!("  Progress of each unit is kept in <unit>.status.json in the stage");
    println!("  directory. Units interrupted mid-run restart the interrupted stage;");
    println!("  failed units are retried. An incomplete log of a stage that was not");
    println!("  interrupted stops the unit: inspect and delete it to rerun.");
    println!();
}

fn print_keyword(keyword: &Keyword) {
    println!("{}", keyword.name);
    println!("    {}", keyword.description);

    if let Some(default) = keyword.default_value {
        println!("    Default: {}", default);
    }

    if let Some(example) = keyword.example {
        println!("    Example: {}", example);
    }
}
