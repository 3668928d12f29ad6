//! Run orchestration.
//!
//! One [`Harness`] drives one run through a fixed sequence: clock
//! negotiation, platform bring-up, verification strategy selection,
//! collaborator construction, the workload run and the final report.

use std::io::{self, Write};
use std::sync::Arc;

use tandem_platform::{
    Backend, MemoryRegion, PerfMonitor, PerformanceReport, Platform, ProcControl,
    VerificationPacketConfig,
};
use tandem_verify::{
    GoldenModelVerifier, NullVerifier, StrategyKind, TraceVerifier, Verification,
    VerificationStats, VerificationStrategy,
};
use tracing::{debug, info, warn};

use crate::clock::{self, ClockNegotiation};
use crate::config::{RunConfiguration, RunMode};
use crate::error::Result;
use crate::htif::Htif;
use crate::interrupt::VerificationSlot;
use crate::report;

/// Warning shown whenever the golden model is selected.
pub const GOLDEN_MODEL_WARNING: &str =
    "Spike-based tandem verification is not fully tested for priv spec v1.9 yet";

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    ClockNegotiated,
    PlatformReady,
    Verifying,
    Running,
    Completed(i32),
    /// Terminal state entered from the interrupt path.
    Interrupted,
}

impl RunState {
    /// Pack into one word: tag in the low byte, outcome above it.
    pub const fn to_bits(self) -> u64 {
        match self {
            Self::Uninitialized => 0,
            Self::ClockNegotiated => 1,
            Self::PlatformReady => 2,
            Self::Verifying => 3,
            Self::Running => 4,
            Self::Completed(outcome) => ((outcome.cast_unsigned() as u64) << 8) | 5,
            Self::Interrupted => 6,
        }
    }

    pub const fn from_bits(bits: u64) -> Self {
        match bits & 0xff {
            1 => Self::ClockNegotiated,
            2 => Self::PlatformReady,
            3 => Self::Verifying,
            4 => Self::Running,
            5 => Self::Completed(((bits >> 8) as u32).cast_signed()),
            6 => Self::Interrupted,
            _ => Self::Uninitialized,
        }
    }
}

/// What a completed run produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Exit code of the workload; the process exit code.
    pub outcome: i32,
    pub mode: RunMode,
    pub strategy: StrategyKind,
    pub clock: ClockNegotiation,
    pub verification: VerificationStats,
    pub performance: PerformanceReport,
}

/// Owns every collaborator of one run.
pub struct Harness<'a, B: Backend> {
    backend: B,
    config: &'a RunConfiguration,
    slot: Arc<VerificationSlot>,
    out: Box<dyn Write + 'a>,
    err: Box<dyn Write + 'a>,
}

impl<'a, B: Backend> Harness<'a, B> {
    pub fn new(backend: B, config: &'a RunConfiguration, slot: Arc<VerificationSlot>) -> Self {
        Self {
            backend,
            config,
            slot,
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
        }
    }

    /// Redirect the human-readable output (stdout and stderr respectively).
    pub fn with_output(mut self, out: Box<dyn Write + 'a>, err: Box<dyn Write + 'a>) -> Self {
        self.out = out;
        self.err = err;
        self
    }

    /// Current state, including `Interrupted` set by the interrupt watcher.
    pub fn state(&self) -> RunState {
        self.slot.state()
    }

    fn enter(&self, state: RunState) {
        let now = self.slot.advance(state);
        debug!(state = ?now, "run state");
    }

    /// Run the workload once and report. Errors mean the run never started.
    ///
    /// Console output is best-effort: a closed stdout or stderr is logged and
    /// never stops the run or changes its outcome.
    pub fn run(&mut self) -> Result<RunSummary> {
        let config = self.config;
        best_effort(
            writeln!(self.err, "htif_args: {}", config.htif_args.join(", ")),
            "htif arguments",
        );
        info!(mode = %config.mode, args = ?config.htif_args, "starting run");

        let clock = clock::negotiate(&mut self.backend, config.clock_period_ns);
        best_effort(writeln!(self.out, "{}", clock.summary()), "clock summary");
        self.enter(RunState::ClockNegotiated);

        let mut proc_control = self.backend.proc_control()?;
        let mut platform = self.backend.platform(
            MemoryRegion::ram(config.ram_size),
            MemoryRegion::rom(config.rom_size),
        );
        platform.init()?;
        self.enter(RunState::PlatformReady);

        let strategy = self.select_strategy(&mut proc_control)?;
        let verification = Arc::new(Verification::new(strategy));
        self.slot.install(Arc::clone(&verification));
        proc_control.attach_packet_sink(Arc::clone(&verification) as _);
        self.enter(RunState::Verifying);
        debug!(strategy = %verification.kind(), "verification active");

        let mut perf = self.backend.perf_monitor();
        proc_control.attach_mmio(self.backend.external_mmio());

        self.enter(RunState::Running);
        let outcome = Htif::new(&config.htif_args, &mut proc_control, &mut platform).run();
        perf.set_enable(false);
        proc_control.stop();
        self.enter(RunState::Completed(outcome));
        info!(outcome, "run completed");

        report::report_completion(
            &mut self.err,
            outcome,
            &verification,
            &perf,
            &config.perf_report,
        );
        best_effort(self.out.flush(), "stdout");
        best_effort(self.err.flush(), "stderr");

        Ok(RunSummary {
            outcome,
            mode: config.mode,
            strategy: verification.kind(),
            clock,
            verification: verification.stats(),
            performance: perf.report(),
        })
    }

    fn select_strategy(&mut self, proc_control: &mut B::Proc) -> Result<VerificationStrategy> {
        let config = self.config;
        let strategy = match config.mode {
            RunMode::JustRun => {
                proc_control.configure_verification_packets(VerificationPacketConfig::DISABLED);
                NullVerifier::new().into()
            }
            RunMode::JustTrace => TraceVerifier::stderr().into(),
            RunMode::TandemVerify => {
                warn!("{GOLDEN_MODEL_WARNING}");
                best_effort(
                    writeln!(self.err, "WARNING: {GOLDEN_MODEL_WARNING}"),
                    "golden model warning",
                );
                let reference =
                    self.backend
                        .reference_model(&config.htif_args, config.ram_size, &config.isa)?;
                GoldenModelVerifier::with_reference(reference).into()
            }
        };
        Ok(strategy)
    }
}

/// Log a failed console write and carry on.
pub(crate) fn best_effort(result: io::Result<()>, what: &str) {
    if let Err(e) = result {
        warn!(error = %e, "failed to write {what}");
    }
}

impl<B: Backend> std::fmt::Debug for Harness<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
