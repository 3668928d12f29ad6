//! Performance monitoring for a run.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::host_counters::{PerfCounters, PerfGroup};

/// Counters bumped by the transport while the device runs.
#[derive(Debug, Default)]
pub struct RunCounters {
    instret: AtomicU64,
    packets: AtomicU64,
    mmio_requests: AtomicU64,
}

impl RunCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_instruction(&self) {
        self.instret.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mmio(&self) {
        self.mmio_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn instret(&self) -> u64 {
        self.instret.load(Ordering::Relaxed)
    }

    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn mmio_requests(&self) -> u64 {
        self.mmio_requests.load(Ordering::Relaxed)
    }
}

/// Snapshot of the run's performance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceReport {
    pub elapsed: Duration,
    /// Instructions retired by the device.
    pub instret: u64,
    /// Verification packets delivered to the host.
    pub packets: u64,
    pub mmio_requests: u64,
    pub host: PerfCounters,
}

impl PerformanceReport {
    /// Device instructions per second of wall time, in millions.
    pub fn mips(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.instret as f64 / secs / 1_000_000.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "elapsed_seconds {:.6}", self.elapsed.as_secs_f64())?;
        writeln!(f, "instret {}", self.instret)?;
        writeln!(f, "mips {:.3}", self.mips())?;
        writeln!(f, "verification_packets {}", self.packets)?;
        writeln!(f, "mmio_requests {}", self.mmio_requests)?;
        let host = [
            ("host_cycles", self.host.cycles),
            ("host_instructions", self.host.instructions),
            ("host_branches", self.host.branches),
            ("host_branch_misses", self.host.branch_misses),
        ];
        for (name, value) in host {
            if let Some(v) = value {
                writeln!(f, "{name} {v}")?;
            }
        }
        if let Some(ipc) = self.host.ipc() {
            writeln!(f, "host_ipc {ipc:.3}")?;
        }
        Ok(())
    }
}

/// Performance counter backend.
///
/// Collection is active from construction. `set_enable(false)` freezes the
/// counters; reports read after that never change.
pub trait PerfMonitor {
    fn set_enable(&mut self, enable: bool);

    fn is_enabled(&self) -> bool;

    fn report(&self) -> PerformanceReport;

    /// Print the report to stderr and write it to `path`.
    fn print_performance(&self, path: &Path) -> io::Result<()> {
        let report = self.report().to_string();
        let printed = {
            let mut stderr = io::stderr().lock();
            stderr.write_all(report.as_bytes()).and_then(|()| stderr.flush())
        };
        // The file is written even when stderr is gone.
        fs::write(path, report).and(printed)
    }
}

/// Wall clock, shared run counters and host perf events.
pub struct HostPerfMonitor {
    counters: Arc<RunCounters>,
    started: Instant,
    host: Option<PerfGroup>,
    frozen: Option<PerformanceReport>,
}

impl HostPerfMonitor {
    pub fn new(counters: Arc<RunCounters>) -> Self {
        let mut host = PerfGroup::new();
        if let Some(group) = host.as_mut()
            && let Err(e) = group.enable()
        {
            debug!(error = %e, "host perf counters unavailable");
            host = None;
        }
        Self {
            counters,
            started: Instant::now(),
            host,
            frozen: None,
        }
    }

    fn snapshot(&self, host: PerfCounters) -> PerformanceReport {
        PerformanceReport {
            elapsed: self.started.elapsed(),
            instret: self.counters.instret(),
            packets: self.counters.packets(),
            mmio_requests: self.counters.mmio_requests(),
            host,
        }
    }
}

impl PerfMonitor for HostPerfMonitor {
    fn set_enable(&mut self, enable: bool) {
        if enable {
            if self.frozen.take().is_some() {
                self.started = Instant::now();
                if let Some(group) = self.host.as_mut() {
                    let _ = group.enable();
                }
            }
            return;
        }
        if self.frozen.is_some() {
            return;
        }
        let host = match self.host.as_mut() {
            Some(group) => {
                let _ = group.disable();
                group.read().unwrap_or_default()
            }
            None => PerfCounters::default(),
        };
        self.frozen = Some(self.snapshot(host));
    }

    fn is_enabled(&self) -> bool {
        self.frozen.is_none()
    }

    fn report(&self) -> PerformanceReport {
        self.frozen
            .unwrap_or_else(|| self.snapshot(PerfCounters::default()))
    }
}

impl fmt::Debug for HostPerfMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostPerfMonitor")
            .field("host_counters", &self.host.is_some())
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}
