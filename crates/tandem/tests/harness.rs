mod common;

use std::sync::Arc;

use common::{Call, MockBackend, Script, SharedBuf, count, position, tokens, write_workload};
use tandem::{
    HarnessError, Harness, RunConfiguration, RunMode, RunState, RunSummary, VerificationSlot,
    on_interrupt,
};
use tandem_platform::{ClockGrant, ProcEvent, VerificationPacketConfig};
use tandem_verify::{StrategyKind, VerificationPacket};
use tempfile::TempDir;

struct Run {
    result: tandem::Result<RunSummary>,
    log: common::CallLog,
    state: RunState,
    slot: Arc<VerificationSlot>,
    out: SharedBuf,
    err: SharedBuf,
}

fn config(dir: &TempDir, args: &[&str]) -> RunConfiguration {
    let elf = write_workload(dir.path());
    let elf = elf.to_str().unwrap();
    let args: Vec<&str> = args
        .iter()
        .map(|a| if *a == "foo.elf" { elf } else { *a })
        .collect();
    let mut config = RunConfiguration::from_tokens(tokens(&args));
    config.perf_report = dir.path().join("Proc.perfmon.txt");
    config
}

fn run_with(config: &RunConfiguration, script: Script) -> Run {
    let backend = MockBackend::new(script);
    let log = Arc::clone(&backend.log);
    let slot = Arc::new(VerificationSlot::new());
    let out = SharedBuf::default();
    let err = SharedBuf::default();

    let mut harness = Harness::new(backend, config, Arc::clone(&slot))
        .with_output(Box::new(out.clone()), Box::new(err.clone()));
    let result = harness.run();
    let state = harness.state();
    Run {
        result,
        log,
        state,
        slot,
        out,
        err,
    }
}

#[test]
fn just_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf"]);
    let run = run_with(&config, Script::exit_with(5));

    let summary = run.result.unwrap();
    assert_eq!(summary.outcome, 5);
    assert_eq!(summary.mode, RunMode::JustRun);
    assert_eq!(summary.strategy, StrategyKind::Null);
    assert_eq!(run.state, RunState::Completed(5));

    let configured = position(&run.log, |c| {
        *c == Call::ConfigurePackets(VerificationPacketConfig::DISABLED)
    })
    .expect("disable mask sent");
    let attached = position(&run.log, |c| *c == Call::AttachSink).unwrap();
    assert!(configured < attached);
    assert_eq!(count(&run.log, |c| matches!(c, Call::ReferenceModel { .. })), 0);
    assert!(run.err.text().contains("FAILED 5"));
}

#[test]
fn disable_mask_is_all_ones() {
    assert_eq!(VerificationPacketConfig::DISABLED.packets_to_ignore, u64::MAX);
    assert!(!VerificationPacketConfig::DISABLED.synchronization_packets);
}

#[test]
fn exit_code_equals_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf"]);
    for code in [0, 1, 2, 42, 255] {
        let run = run_with(&config, Script::exit_with(code));
        assert_eq!(run.result.unwrap().outcome, code);
    }
}

#[test]
fn tohost_exit_code_becomes_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf"]);
    let script = Script {
        events: vec![ProcEvent::ToHost(0), ProcEvent::ToHost((7 << 1) | 1)],
        ..Script::default()
    };
    let run = run_with(&config, script);
    assert_eq!(run.result.unwrap().outcome, 7);

    let passed = run_with(&config, Script::default());
    assert_eq!(passed.result.unwrap().outcome, 0);
    assert!(passed.err.text().lines().any(|l| l == "PASSED"));
}

#[test]
fn perf_disabled_once_between_run_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf"]);
    let run = run_with(&config, Script::exit_with(0));
    run.result.unwrap();

    assert_eq!(count(&run.log, |c| matches!(c, Call::SetEnable(_))), 1);
    let log = run.log.lock();
    let last_poll = log.iter().rposition(|c| *c == Call::Poll).unwrap();
    let disable = log.iter().position(|c| *c == Call::SetEnable(false)).unwrap();
    let print = log
        .iter()
        .position(|c| matches!(c, Call::PrintPerformance(_)))
        .unwrap();
    assert!(last_poll < disable);
    assert!(disable < print);
    assert_eq!(
        log[print],
        Call::PrintPerformance(dir.path().join("Proc.perfmon.txt"))
    );
}

#[test]
fn mode_flags_first_one_wins() {
    let dir = tempfile::tempdir().unwrap();

    let config_run = config(&dir, &["--just-run", "--just-trace", "foo.elf"]);
    let run = run_with(&config_run, Script::exit_with(0));
    assert_eq!(run.result.unwrap().strategy, StrategyKind::Null);

    let config_trace = config(&dir, &["--just-trace", "--just-run", "foo.elf"]);
    let run = run_with(&config_trace, Script::exit_with(0));
    assert_eq!(run.result.unwrap().strategy, StrategyKind::Trace);
    assert_eq!(
        count(&run.log, |c| matches!(c, Call::ConfigurePackets(_))),
        0
    );
}

#[test]
fn default_mode_builds_golden_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir, &["+signature=sig.txt", "foo.elf", "arg1"]);
    config.ram_size = 128 << 20;
    let run = run_with(&config, Script::exit_with(0));

    let summary = run.result.unwrap();
    assert_eq!(summary.mode, RunMode::TandemVerify);
    assert_eq!(summary.strategy, StrategyKind::GoldenModel);
    assert!(run.err.text().contains(
        "WARNING: Spike-based tandem verification is not fully tested for priv spec v1.9 yet"
    ));

    let expected = Call::ReferenceModel {
        htif_args: config.htif_args.clone(),
        ram_size: 128 << 20,
        isa: "rv64imafdc".to_string(),
    };
    let reference = position(&run.log, |c| *c == expected).expect("golden model built");
    let init = position(&run.log, |c| *c == Call::PlatformInit).unwrap();
    assert!(init < reference);
    assert_eq!(count(&run.log, |c| *c == Call::PlatformInit), 1);
}

#[test]
fn status_printed_for_every_mode() {
    let dir = tempfile::tempdir().unwrap();
    for (args, marker) in [
        (vec!["--just-run", "foo.elf"], "NullTandemVerifier"),
        (vec!["--just-trace", "foo.elf"], "PrintTrace"),
        (vec!["foo.elf"], "SpikeTandemVerifier"),
    ] {
        let config = config(&dir, &args);
        let run = run_with(&config, Script::exit_with(3));
        run.result.unwrap();
        let err = run.err.text();
        let section = err.find("---- Verification results: ").unwrap();
        let status = err.find(marker).unwrap();
        let perf = err.find("---- PerfMonitor results: ").unwrap();
        assert!(section < status && status < perf, "{err}");
    }
}

#[test]
fn golden_model_counts_mismatches() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["foo.elf"]);
    let script = Script {
        packets: vec![
            VerificationPacket::new(0x8000_0000, 0x13),
            VerificationPacket::new(0x8000_0004, 0x0010_0073),
        ],
        reference: Some(vec![
            VerificationPacket::new(0x8000_0000, 0x13),
            VerificationPacket::new(0x8000_0004, 0x0000_0073),
        ]),
        ..Script::exit_with(0)
    };
    let run = run_with(&config, script);

    let summary = run.result.unwrap();
    assert_eq!(summary.verification.packets, 2);
    assert_eq!(summary.verification.mismatches, 1);
    // Verification findings are reported, the outcome stays the workload's.
    assert_eq!(summary.outcome, 0);
}

#[test]
fn refused_clock_request_continues() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf"]);
    let script = Script {
        grant: Some(ClockGrant {
            actual_hz: 50_000_000,
            status: -1,
            errno: 22,
        }),
        ..Script::exit_with(0)
    };
    let run = run_with(&config, script);

    let summary = run.result.unwrap();
    assert_eq!(summary.clock.requested_hz, 100_000_000);
    assert_eq!(summary.clock.actual_hz, 50_000_000);
    assert_eq!(
        run.out.text(),
        "Requested main clock frequency 100.00, actual clock frequency 50.00 MHz status=-1 errno=22\n"
    );
    assert_eq!(
        run.log.lock()[0],
        Call::SetClock {
            clock: 0,
            requested_hz: 100_000_000
        }
    );
}

#[test]
fn workload_is_loaded_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf", "x"]);
    let run = run_with(&config, Script::exit_with(0));
    run.result.unwrap();

    let log = run.log.lock();
    let start = log
        .iter()
        .position(|c| matches!(c, Call::Start(_)))
        .unwrap();
    let Call::Start(launch) = &log[start] else {
        unreachable!()
    };
    assert_eq!(launch.entry, 0x8000_0000);
    assert_eq!(launch.tohost, 0x8000_1000);
    assert_eq!(launch.fromhost, 0x8000_1008);
    assert_eq!(launch.args, config.htif_args);

    let writes: Vec<u64> = log[..start]
        .iter()
        .filter_map(|c| match c {
            Call::WriteMemory { addr, .. } => Some(*addr),
            _ => None,
        })
        .collect();
    assert!(writes.contains(&0x8000_0000));
    assert!(writes.contains(&0x8000_1000));
    // BSS tail zeroed past the file data.
    assert!(writes.contains(&0x8000_1008));
}

#[test]
fn console_output_is_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf"]);
    let putchar = (1u64 << 56) | (1u64 << 48) | u64::from(b'\n');
    let script = Script {
        events: vec![ProcEvent::ToHost(putchar), ProcEvent::ToHost(1)],
        ..Script::default()
    };
    let run = run_with(&config, script);
    assert_eq!(run.result.unwrap().outcome, 0);
    assert_eq!(
        count(&run.log, |c| *c == Call::SetFromhost((1 << 56) | (1 << 48))),
        1
    );
}

#[test]
fn missing_workload_fails_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir, &["--just-run"]);
    config.htif_args = vec![dir.path().join("missing.elf").display().to_string()];
    let run = run_with(&config, Script::exit_with(0));

    assert_eq!(run.result.unwrap().outcome, 1);
    assert_eq!(count(&run.log, |c| matches!(c, Call::Start(_))), 0);
    assert!(run.err.text().contains("FAILED 1"));
}

#[test]
fn no_workload_fails_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run"]);
    let run = run_with(&config, Script::exit_with(0));
    assert_eq!(run.result.unwrap().outcome, 1);
}

#[test]
fn perf_report_failure_keeps_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf"]);
    let script = Script {
        perf_write_fails: true,
        ..Script::exit_with(0)
    };
    let run = run_with(&config, script);
    assert_eq!(run.result.unwrap().outcome, 0);
}

#[test]
fn golden_model_spawn_failure_aborts_before_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["foo.elf"]);
    let script = Script {
        reference: None,
        ..Script::exit_with(0)
    };
    let run = run_with(&config, script);

    assert!(matches!(run.result, Err(HarnessError::Verify(_))));
    assert_eq!(run.state, RunState::PlatformReady);
    assert!(run.slot.get().is_none());
    assert_eq!(count(&run.log, |c| matches!(c, Call::Start(_))), 0);
    let err = run.err.text();
    assert!(!err.contains("PASSED") && !err.contains("FAILED"));
}

#[test]
fn interrupt_after_run_reads_installed_status() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["--just-run", "foo.elf"]);
    let run = run_with(&config, Script::exit_with(0));
    run.result.unwrap();

    let verification = run.slot.get().expect("installed");
    let before = verification.stats();
    let mut out = Vec::new();
    assert_eq!(on_interrupt(&run.slot, &mut out), 1);
    assert_eq!(on_interrupt(&run.slot, &mut out), 1);
    assert_eq!(verification.stats(), before);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.matches(">> Ctrl-C: Exiting...").count(), 2);
    assert!(!text.contains("PASSED"));
    assert!(!text.contains("PerfMonitor results"));

    assert_eq!(run.state, RunState::Completed(0));
    assert_eq!(run.slot.state(), RunState::Interrupted);
    assert_eq!(run.slot.advance(RunState::Completed(0)), RunState::Interrupted);
}

#[test]
fn interrupt_before_construction_exits_one() {
    let slot = VerificationSlot::new();
    let mut out = Vec::new();
    assert_eq!(on_interrupt(&slot, &mut out), 1);
}

struct ClosedPipe;

impl std::io::Write for ClosedPipe {
    fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
    }
}

#[test]
fn closed_console_still_runs_workload() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &["foo.elf"]);
    let backend = MockBackend::new(Script::exit_with(3));
    let log = Arc::clone(&backend.log);
    let slot = Arc::new(VerificationSlot::new());

    let mut harness = Harness::new(backend, &config, Arc::clone(&slot))
        .with_output(Box::new(ClosedPipe), Box::new(ClosedPipe));
    let summary = harness.run().unwrap();

    assert_eq!(summary.outcome, 3);
    assert_eq!(harness.state(), RunState::Completed(3));
    assert!(count(&log, |c| *c == Call::Poll) > 0);
    assert_eq!(count(&log, |c| matches!(c, Call::PrintPerformance(_))), 1);
}

#[test]
fn htif_args_echoed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir, &["--just-run"]);
    config.htif_args = tokens(&["+signature=s", "prog.elf"]);
    let run = run_with(&config, Script::exit_with(0));
    run.result.unwrap();
    assert!(run.err.text().starts_with("htif_args: +signature=s, prog.elf\n"));
}
