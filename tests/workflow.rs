use kisc::checkpoint::{UnitStage, UnitStatus};
use kisc::input::template_geometry;
use kisc::pipeline::{Pipeline, PipelineError, WorkflowConfig};
use kisc::runner::{Invocation, ProcessOutput, ProcessRunner, Result as RunResult};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TOOL_OUTPUT: &str = "mol_dist_sing.com";

/// How the fake engine misbehaves on inputs whose name contains a marker.
#[derive(Clone, Copy)]
enum Failure {
    ExitCode,
    PartialLog,
    MalformedCoupling,
}

/// Stands in for the cluster: records every invocation and writes the files
/// the real programs would.
struct FakeCluster {
    calls: RefCell<Vec<Invocation>>,
    fail_on: Option<(&'static str, Failure)>,
}

impl FakeCluster {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_on: None,
        }
    }

    fn failing(marker: &'static str, failure: Failure) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_on: Some((marker, failure)),
        }
    }

    fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    fn count(&self, program: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.program.ends_with(program))
            .count()
    }

    fn engine(&self, inv: &Invocation) -> ProcessOutput {
        let input = inv.working_dir.join(&inv.args[0]);
        let log = input.with_extension("log");
        let text = fs::read_to_string(&input).unwrap();

        if let Some((marker, failure)) = self.fail_on {
            if inv.args[0].contains(marker) {
                match failure {
                    Failure::ExitCode => {
                        return ProcessOutput::failed(1, "Error termination via Lnk1e")
                    }
                    Failure::PartialLog => {
                        fs::write(&log, format!("{}\n Link1:  Proceeding\n", text)).unwrap();
                        return ProcessOutput::failed(1, "Error termination via Lnk1e");
                    }
                    Failure::MalformedCoupling => {}
                }
            }
        }

        let geometry = template_geometry(&text).unwrap();
        let mut out = format!(" Entering Gaussian System\n{}\n", text);
        out.push_str(
            "                         Standard orientation:\n \
             ---------------------------------------------------------------------\n \
             Center     Atomic      Atomic             Coordinates (Angstroms)\n \
             Number     Number       Type             X           Y           Z\n \
             ---------------------------------------------------------------------\n",
        );
        for (i, atom) in geometry.atoms.iter().enumerate() {
            let z = match atom.symbol.as_str() {
                "H" => 1,
                "C" => 6,
                "O" => 8,
                other => panic!("unexpected element {}", other),
            };
            out.push_str(&format!(
                "      {:>2}          {:>2}           0    {:>12.6}{:>12.6}{:>12.6}\n",
                i + 1,
                z,
                atom.position.x,
                atom.position.y,
                atom.position.z
            ));
        }
        out.push_str(" ---------------------------------------------------------------------\n");
        for (n, e) in [(1, 3.1), (2, 3.6), (3, 4.2)] {
            out.push_str(&format!(
                " Excited State   {}:      Singlet-A      {:.4} eV  300.00 nm  f=0.0100\n",
                n, e
            ));
        }
        for (n, e) in [(4, 2.8), (5, 3.3), (6, 3.9)] {
            out.push_str(&format!(
                " Excited State   {}:      Triplet-A      {:.4} eV  350.00 nm  f=0.0000\n",
                n, e
            ));
        }
        out.push_str(" Normal termination of Gaussian 16 at Mon Jun  3 10:00:00 2024.\n");
        fs::write(&log, out).unwrap();
        if text.contains("%rwf=gaussian.rwf") {
            fs::write(inv.working_dir.join("gaussian.rwf"), [0u8; 64]).unwrap();
        }
        ProcessOutput::ok()
    }

    fn post_processor(&self, inv: &Invocation) -> ProcessOutput {
        let dir = &inv.working_dir;
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        let amp = kisc::naming::amplitude_from_dir_name(&name);
        if let Some((marker, Failure::MalformedCoupling)) = self.fail_on {
            if name.contains(marker) {
                fs::write(dir.join("soc_out.dat"), "<S1|Hso|T1,1> 1.0 cm-1\n").unwrap();
                return ProcessOutput::ok();
            }
        }
        let soc = format!(
            "<S0|Hso|T1,1>: {:.4} cm-1\n<S1|Hso|T1,1>: {:.4} cm-1\n<S1|Hso|T2,1>: {:.4} cm-1\n<S2|Hso|T1,1>: {:.4} cm-1\n",
            5.0 + amp,
            10.0 + amp,
            2.0 - amp,
            0.5
        );
        fs::write(dir.join("soc_out.dat"), soc).unwrap();
        ProcessOutput::ok()
    }

    fn distortion_tool(&self, inv: &Invocation) -> ProcessOutput {
        let mut text = String::new();
        for (mode, sign, shift) in [(7, "+", 0.5), (7, "-", -0.5), (8, "+", 0.5)] {
            text.push_str(&format!(
                "%nprocshared=4\n%mem=4GB\n# b3lyp/6-31g(d) nosymm\n\n\
                 Distortion along normal mode N {} by {}0.5\n\n0 1\n \
                 C 0.0 0.0 {:.4}\n O 0.0 0.0 {:.4}\n H 0.9 0.0 -0.4\n\n--Link1--\n",
                mode,
                sign,
                0.1 * shift,
                1.2 - 0.1 * shift
            ));
        }
        fs::write(inv.working_dir.join(TOOL_OUTPUT), text).unwrap();
        ProcessOutput::ok()
    }
}

impl ProcessRunner for FakeCluster {
    fn run(&self, invocation: &Invocation) -> RunResult<ProcessOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        let output = match invocation.program.as_str() {
            "g16" => self.engine(invocation),
            "pysoc.py" => self.post_processor(invocation),
            "gfortran" => {
                fs::write(&invocation.args[2], "#!/bin/sh\n").unwrap();
                ProcessOutput::ok()
            }
            p if p.ends_with("distort") => self.distortion_tool(invocation),
            other => panic!("unexpected program {}", other),
        };
        Ok(output)
    }
}

fn run_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("distort.f90"), "program distort\nend program\n").unwrap();
    fs::write(dir.path().join("inp_sing.txt"), "mol.log\n7\n0.5\n").unwrap();
    dir
}

fn config(root: &Path) -> WorkflowConfig {
    WorkflowConfig {
        root: root.to_path_buf(),
        modes: vec![7],
        timeout: None,
        ..WorkflowConfig::default()
    }
}

fn stage(root: &Path) -> PathBuf {
    root.join("singlets")
}

fn status_of(root: &Path, unit: &str) -> UnitStatus {
    UnitStatus::load(&stage(root).join(format!("{}.status.json", unit))).unwrap()
}

#[test]
fn test_batch_takes_every_unit_through_all_stages() {
    let dir = run_dir();
    let pipeline = Pipeline::new(config(dir.path()), FakeCluster::new());
    let summary = pipeline.run_distortion_batch().unwrap();

    assert!(summary.is_success());
    assert_eq!(
        summary.completed,
        vec!["mol_dist_sing_7_+0.5", "mol_dist_sing_7_-0.5"]
    );

    let runner = pipeline.runner();
    assert_eq!(runner.count("gfortran"), 1);
    assert_eq!(runner.count("distort"), 1);
    assert_eq!(runner.count("g16"), 6);
    assert_eq!(runner.count("pysoc.py"), 2);

    let st = stage(dir.path());
    for amp in ["+0.5", "-0.5"] {
        assert!(st.join(format!("VEE{}", amp)).join(format!("energy_dis_7_{}.log", amp)).is_file());
        assert!(st.join(format!("VEE{}", amp)).join(format!("energy_dis_7_{}.com", amp)).is_file());
        assert!(!st.join(format!("energy_dis_7_{}.log", amp)).exists());
        assert!(st.join(format!("soc_dis_7_{}", amp)).join("soc_out.dat").is_file());
        let status = status_of(dir.path(), &format!("mol_dist_sing_7_{}", amp));
        assert_eq!(status.stage, UnitStage::CouplingComplete);
    }
    assert!(!st.join("mol_dist_sing_8_+0.5.com").exists());

    let table = fs::read_to_string(st.join("soc_vs_distortion_mode7.dat")).unwrap();
    assert_eq!(summary.tables, vec![st.join("soc_vs_distortion_mode7.dat")]);
    assert!(table.contains("# Mode 7, S1"));
    assert!(table.contains("# Mode 7, S2"));
    assert!(!table.contains("S0"));

    // S1 section first, rows sorted by amplitude.
    let rows: Vec<&str> = table
        .lines()
        .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
        .collect();
    assert!(rows[0].trim_start().starts_with("-0.5000"));
    assert!(rows[0].contains("9.5000e+00"));
    assert!(rows[1].trim_start().starts_with("0.5000"));
    assert!(rows[1].contains("1.0500e+01"));
}

#[test]
fn test_engine_runs_in_the_input_directory() {
    let dir = run_dir();
    let pipeline = Pipeline::new(config(dir.path()), FakeCluster::new());
    pipeline.run_distortion_batch().unwrap();

    let calls = pipeline.runner().calls();
    let first_engine = calls.iter().find(|c| c.program == "g16").unwrap();
    assert_eq!(first_engine.working_dir, stage(dir.path()));
    assert_eq!(first_engine.args, vec!["mol_dist_sing_7_+0.5.com"]);

    let tool = calls.iter().find(|c| c.program.ends_with("distort")).unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    assert_eq!(tool.stdin_file, Some(root.join("inp_sing.txt")));
    assert_eq!(tool.working_dir, root);

    let soc = calls.iter().find(|c| c.program == "pysoc.py").unwrap();
    assert!(soc.args.is_empty());
    assert_eq!(soc.working_dir, stage(dir.path()).join("soc_dis_7_+0.5"));
}

#[test]
fn test_second_pass_starts_no_programs() {
    let dir = run_dir();
    Pipeline::new(config(dir.path()), FakeCluster::new())
        .run_distortion_batch()
        .unwrap();

    let again = Pipeline::new(config(dir.path()), FakeCluster::new());
    let summary = again.run_distortion_batch().unwrap();
    assert_eq!(summary.completed.len(), 2);
    assert!(again.runner().calls().is_empty());
}

#[test]
fn test_failed_unit_does_not_stop_the_batch() {
    let dir = run_dir();
    let failing = Pipeline::new(
        config(dir.path()),
        FakeCluster::failing("energy_dis_7_-0.5", Failure::ExitCode),
    );
    let summary = failing.run_distortion_batch().unwrap();

    assert_eq!(summary.completed, vec!["mol_dist_sing_7_+0.5"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "mol_dist_sing_7_-0.5");
    assert!(summary.failed[0].1.contains("exit code"));
    let status = status_of(dir.path(), "mol_dist_sing_7_-0.5");
    assert_eq!(status.stage, UnitStage::Failed);
    assert_eq!(status.failed_at, Some(UnitStage::EnergyPending));

    // The retry only redoes what is missing.
    let retry = Pipeline::new(config(dir.path()), FakeCluster::new());
    let summary = retry.run_distortion_batch().unwrap();
    assert!(summary.is_success());
    assert_eq!(retry.runner().count("g16"), 2);
    assert_eq!(retry.runner().count("pysoc.py"), 1);
    assert_eq!(
        status_of(dir.path(), "mol_dist_sing_7_-0.5").stage,
        UnitStage::CouplingComplete
    );
}

#[test]
fn test_unreadable_coupling_output_fails_only_its_unit() {
    let dir = run_dir();
    let pipeline = Pipeline::new(
        config(dir.path()),
        FakeCluster::failing("soc_dis_7_-0.5", Failure::MalformedCoupling),
    );
    let summary = pipeline.run_distortion_batch().unwrap();

    assert_eq!(summary.completed, vec!["mol_dist_sing_7_+0.5"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "mol_dist_sing_7_-0.5");
    assert!(summary.failed[0].1.contains("missing ':'"));
    let status = status_of(dir.path(), "mol_dist_sing_7_-0.5");
    assert_eq!(status.stage, UnitStage::Failed);
    assert_eq!(status.failed_at, Some(UnitStage::CouplingPending));

    // The table still carries the finished unit.
    assert_eq!(summary.tables.len(), 1);
    let table = fs::read_to_string(&summary.tables[0]).unwrap();
    assert!(table.contains("1.0500e+01"));
    assert!(!table.contains("-0.5000"));

    // A retry regenerates the bad output without rerunning the engine.
    let retry = Pipeline::new(config(dir.path()), FakeCluster::new());
    assert!(retry.run_distortion_batch().unwrap().is_success());
    assert_eq!(retry.runner().count("g16"), 0);
    assert_eq!(retry.runner().count("pysoc.py"), 1);
}

#[test]
fn test_coupling_scratch_removed_after_completion_is_recorded() {
    let dir = run_dir();
    let cfg = WorkflowConfig {
        cleanup_after_coupling: true,
        ..config(dir.path())
    };
    let pipeline = Pipeline::new(cfg.clone(), FakeCluster::new());
    assert!(pipeline.run_distortion_batch().unwrap().is_success());

    let soc_dir = stage(dir.path()).join("soc_dis_7_+0.5");
    assert!(!soc_dir.join("gaussian.rwf").exists());
    assert!(soc_dir.join("soc_out.dat").is_file());
    assert_eq!(
        status_of(dir.path(), "mol_dist_sing_7_+0.5").stage,
        UnitStage::CouplingComplete
    );

    // Killed after the status was saved but before cleanup finished.
    fs::write(soc_dir.join("gaussian.rwf"), [0u8; 64]).unwrap();
    let again = Pipeline::new(cfg, FakeCluster::new());
    assert!(again.run_distortion_batch().unwrap().is_success());
    assert!(again.runner().calls().is_empty());
    assert!(!soc_dir.join("gaussian.rwf").exists());
}

#[test]
fn test_abort_on_failure_when_configured() {
    let dir = run_dir();
    let cfg = WorkflowConfig {
        continue_on_failure: false,
        ..config(dir.path())
    };
    let pipeline = Pipeline::new(cfg, FakeCluster::failing("mol_dist_sing_7_+0.5", Failure::ExitCode));
    let err = pipeline.run_distortion_batch().unwrap_err();
    assert!(matches!(err, PipelineError::Aborted { ref unit, .. } if unit == "mol_dist_sing_7_+0.5"));
    assert!(!stage(dir.path()).join("mol_dist_sing_7_-0.5.com").exists());
}

#[test]
fn test_incomplete_log_needs_manual_removal() {
    let dir = run_dir();
    let pipeline = Pipeline::new(
        config(dir.path()),
        FakeCluster::failing("energy_dis_7_-0.5", Failure::PartialLog),
    );
    pipeline.run_distortion_batch().unwrap();
    let partial = stage(dir.path()).join("energy_dis_7_-0.5.log");
    assert!(partial.is_file());

    let retry = Pipeline::new(config(dir.path()), FakeCluster::new());
    let summary = retry.run_distortion_batch().unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.contains("incomplete calculation"));
    assert_eq!(retry.runner().count("g16"), 0);

    fs::remove_file(&partial).unwrap();
    let third = Pipeline::new(config(dir.path()), FakeCluster::new());
    assert!(third.run_distortion_batch().unwrap().is_success());
    assert_eq!(third.runner().count("g16"), 2);
}

#[test]
fn test_interrupted_stage_is_rerun() {
    let dir = run_dir();
    Pipeline::new(config(dir.path()), FakeCluster::new())
        .run_distortion_batch()
        .unwrap();

    // Simulate a kill during the +0.5 energy job.
    let st = stage(dir.path());
    fs::remove_dir_all(st.join("VEE+0.5")).unwrap();
    fs::remove_dir_all(st.join("soc_dis_7_+0.5")).unwrap();
    fs::write(st.join("energy_dis_7_+0.5.log"), " Entering Gaussian System\n").unwrap();
    let mut status = UnitStatus::new("mol_dist_sing_7_+0.5", "7_+0.5");
    status.advance(UnitStage::EnergyPending).unwrap();
    status
        .save(&st.join("mol_dist_sing_7_+0.5.status.json"))
        .unwrap();

    let resumed = Pipeline::new(config(dir.path()), FakeCluster::new());
    let summary = resumed.run_distortion_batch().unwrap();
    assert!(summary.is_success());

    let engine_inputs: Vec<String> = resumed
        .runner()
        .calls()
        .iter()
        .filter(|c| c.program == "g16")
        .map(|c| c.args[0].clone())
        .collect();
    assert_eq!(engine_inputs, vec!["energy_dis_7_+0.5.com", "gaussian.com"]);
    assert!(st.join("VEE+0.5").join("energy_dis_7_+0.5.log").is_file());
}

#[test]
fn test_existing_tool_output_skips_compilation() {
    let dir = run_dir();
    let first = Pipeline::new(config(dir.path()), FakeCluster::new());
    first.prepare_distortion_outputs().unwrap();
    assert_eq!(first.runner().count("gfortran"), 1);

    let second = Pipeline::new(config(dir.path()), FakeCluster::new());
    let outputs = second.prepare_distortion_outputs().unwrap();
    assert_eq!(outputs, vec![dir.path().join(TOOL_OUTPUT)]);
    assert!(second.runner().calls().is_empty());
}

#[test]
fn test_molecule_workflow_writes_rate_report() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("benzo.com"),
        "%chk=benzo.chk\n# opt freq b3lyp/6-31g(d) geom=connectivity\n\nbenzo\n\n0 1\n C 0.0 0.0 0.0\n O 0.0 0.0 1.2\n H 0.9 0.0 -0.4\n\n 1 2 2.0 3 1.0\n 2\n 3\n\n",
    )
    .unwrap();
    let pipeline = Pipeline::new(config(dir.path()), FakeCluster::new());
    let outcome = pipeline.run_molecule(Path::new("benzo.com")).unwrap();

    let engine_inputs: Vec<String> = pipeline
        .runner()
        .calls()
        .iter()
        .filter(|c| c.program == "g16")
        .map(|c| c.args[0].clone())
        .collect();
    assert_eq!(
        engine_inputs,
        vec!["benzo.com", "benzo_st-energy.com", "gaussian.com"]
    );
    assert_eq!(pipeline.runner().count("pysoc.py"), 1);

    let energy = fs::read_to_string(dir.path().join("benzo_st-energy.com")).unwrap();
    assert!(energy.contains("# td=(50-50,nstates=10) b3lyp/6-31g(d) geom=connectivity\n"));
    assert!(!energy.contains("opt freq"));
    assert!(energy.ends_with(" 1 2 2.0 3 1.0\n 2\n 3\n\n"));
    let coupling = fs::read_to_string(dir.path().join("benzo_soc").join("gaussian.com")).unwrap();
    assert!(coupling.contains("nosymm gfinput geom=connectivity\n"));
    assert!(coupling.ends_with(" 1 2 2.0 3 1.0\n 2\n 3\n\n"));
    assert!(dir.path().join("benzo_soc").join("soc_out.dat").is_file());

    assert_eq!(outcome.geometry.num_atoms(), 3);
    assert_eq!(outcome.report, dir.path().join("results.out"));
    assert_eq!(outcome.rates.rates.len(), 4);
    assert!(outcome.rates.skipped.is_empty());
    let report = fs::read_to_string(&outcome.report).unwrap();
    assert!(report.contains("Intersystem Crossing Rate Constants"));
    assert!(report.contains("Top 5 SOC Values"));

    // Everything is in place: a rerun only recomputes the report.
    let again = Pipeline::new(config(dir.path()), FakeCluster::new());
    again.run_molecule(Path::new("benzo.com")).unwrap();
    assert!(again.runner().calls().is_empty());
}
