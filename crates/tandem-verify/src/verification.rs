//! Shared verification handle.
//!
//! One `Verification` exists per run. The transport delivers packets through
//! [`PacketSink`]; the orchestrator and the interrupt watcher read its status.
//!
//! The strategy lock may be held across verifier I/O (trace output, reference
//! model pipes). Counters live outside it, and status readers wait for the
//! strategy at most [`STATUS_LOCK_TIMEOUT`].

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::packet::VerificationPacket;
use crate::strategy::{StrategyKind, VerificationStrategy};
use crate::verifier::{Check, TandemVerifier};

/// How long a status reader waits for a strategy that is busy checking.
pub const STATUS_LOCK_TIMEOUT: Duration = Duration::from_millis(200);

/// Receiver of verification packets.
pub trait PacketSink: Send + Sync {
    fn accept(&self, packet: &VerificationPacket);
}

/// Counters kept independent of the active strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationStats {
    /// Packets delivered.
    pub packets: u64,
    /// Packets the transport reported as dropped.
    pub skipped: u64,
    /// Packets the strategy flagged.
    pub mismatches: u64,
    /// PC of the last delivered packet.
    pub last_pc: Option<u64>,
}

#[derive(Default)]
struct Counters {
    packets: AtomicU64,
    skipped: AtomicU64,
    mismatches: AtomicU64,
    last_pc: AtomicU64,
}

/// The run's single verification strategy plus its counters.
pub struct Verification {
    kind: StrategyKind,
    strategy: Mutex<VerificationStrategy>,
    counters: Counters,
}

impl Verification {
    pub fn new(strategy: impl Into<VerificationStrategy>) -> Self {
        let strategy = strategy.into();
        Self {
            kind: strategy.kind(),
            strategy: Mutex::new(strategy),
            counters: Counters::default(),
        }
    }

    /// Which strategy is active. Fixed for the lifetime of the handle.
    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Feed one packet to the active strategy.
    pub fn record_event(&self, packet: &VerificationPacket) -> Check {
        let c = &self.counters;
        c.last_pc.store(packet.pc, Ordering::Relaxed);
        c.skipped.fetch_add(packet.skipped, Ordering::Relaxed);
        c.packets.fetch_add(1, Ordering::Release);

        let check = self.strategy.lock().check(packet);
        if check.is_mismatch() {
            c.mismatches.fetch_add(1, Ordering::Relaxed);
        }
        trace!(pc = format_args!("{:#x}", packet.pc), ?check, "verification packet");
        check
    }

    pub fn stats(&self) -> VerificationStats {
        let c = &self.counters;
        let packets = c.packets.load(Ordering::Acquire);
        VerificationStats {
            packets,
            skipped: c.skipped.load(Ordering::Relaxed),
            mismatches: c.mismatches.load(Ordering::Relaxed),
            last_pc: (packets > 0).then(|| c.last_pc.load(Ordering::Relaxed)),
        }
    }

    /// Write the status report. Reads only, so it may be called any number of
    /// times from any thread.
    ///
    /// The report is rendered in memory before `out` is touched. If the
    /// strategy stays busy past [`STATUS_LOCK_TIMEOUT`] only the counters are
    /// reported.
    pub fn write_status(&self, out: &mut dyn Write) -> io::Result<()> {
        let buf = self.render_status(STATUS_LOCK_TIMEOUT)?;
        out.write_all(&buf)
    }

    fn render_status(&self, timeout: Duration) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let stats = self.stats();
        write!(
            buf,
            "{} verification packets ({} skipped, {} mismatches)",
            stats.packets, stats.skipped, stats.mismatches
        )?;
        match stats.last_pc {
            Some(pc) => writeln!(buf, ", last pc 0x{pc:016x}")?,
            None => writeln!(buf)?,
        }
        match self.strategy.try_lock_for(timeout) {
            Some(strategy) => strategy.write_status(&mut buf)?,
            None => {
                warn!(strategy = %self.kind, "verifier busy, status incomplete");
                writeln!(buf, "{} verifier busy: status unavailable", self.kind)?;
            }
        }
        Ok(buf)
    }

    /// Print the status report to stderr.
    pub fn print_status(&self) {
        let Ok(buf) = self.render_status(STATUS_LOCK_TIMEOUT) else {
            return;
        };
        let mut lock = io::stderr().lock();
        let _ = lock.write_all(&buf);
        let _ = lock.flush();
    }
}

impl PacketSink for Verification {
    fn accept(&self, packet: &VerificationPacket) {
        self.record_event(packet);
    }
}

impl std::fmt::Debug for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verification")
            .field("kind", &self.kind)
            .field("stats", &self.stats())
            .finish()
    }
}
