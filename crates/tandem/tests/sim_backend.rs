mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{SharedBuf, tokens, write_workload};
use tandem::{Harness, RunConfiguration, VerificationSlot};
use tandem_platform::sim::{SimBackend, SimCommand};
use tandem_verify::StrategyKind;

const DUT_SCRIPT: &str = "\
echo 'core   0: 3 0x0000000080000000 (0x00000297) x5  0x0000000080000000'
echo 'core   0: 3 0x0000000080000004 (0x00000013)'
echo 'core   0: 3 0x0000000080000008 (0x00b52023) mem 0x0000000080001000 0x000000000000000b'
sleep 5
";

fn sh_backend() -> SimBackend {
    SimBackend::new(SimCommand {
        program: PathBuf::from("sh"),
        args: tokens(&["-c", DUT_SCRIPT, "dut"]),
    })
}

#[test]
fn simulated_device_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_workload(dir.path());
    let mut config = RunConfiguration::from_tokens(tokens(&["--just-trace", elf.to_str().unwrap()]));
    config.perf_report = dir.path().join("Proc.perfmon.txt");

    let backend = sh_backend();
    let counters = Arc::clone(backend.counters());
    let err = SharedBuf::default();
    let summary = Harness::new(backend, &config, Arc::new(VerificationSlot::new()))
        .with_output(Box::new(SharedBuf::default()), Box::new(err.clone()))
        .run()
        .unwrap();

    // tohost = (5 << 1) | 1
    assert_eq!(summary.outcome, 5);
    assert_eq!(summary.strategy, StrategyKind::Trace);
    assert_eq!(summary.verification.packets, 3);
    assert_eq!(summary.performance.instret, 3);
    assert_eq!(counters.packets(), 3);
    assert!(err.text().contains("FAILED 5"));

    let report = std::fs::read_to_string(&config.perf_report).unwrap();
    assert!(report.contains("instret 3"));
}

#[test]
fn just_run_delivers_no_packets() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_workload(dir.path());
    let mut config = RunConfiguration::from_tokens(tokens(&["--just-run", elf.to_str().unwrap()]));
    config.perf_report = dir.path().join("Proc.perfmon.txt");

    let summary = Harness::new(sh_backend(), &config, Arc::new(VerificationSlot::new()))
        .with_output(Box::new(SharedBuf::default()), Box::new(SharedBuf::default()))
        .run()
        .unwrap();

    assert_eq!(summary.outcome, 5);
    assert_eq!(summary.verification.packets, 0);
    assert_eq!(summary.performance.instret, 3);
}
