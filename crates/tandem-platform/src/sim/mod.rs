//! Simulated backend: the device is a simulator child process.
//!
//! The child receives the HTIF arguments and loads the workload itself;
//! [`SimPlatform`] only mirrors the image on the host side.

mod platform;
mod socket;
mod transport;

pub use platform::SimPlatform;
pub use socket::{BLUESIM_SOCKET_ENV, SOFTWARE_SOCKET_ENV, SocketGuard};
pub use transport::{SimCommand, SimProcControl};

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::backend::Backend;
use crate::memory::MemoryRegion;
use crate::mmio::{ConsoleMmio, ExternalMmio};
use crate::perf::{HostPerfMonitor, RunCounters};
use crate::platform::{ClockControl, ClockGrant};

/// Default simulator command.
pub const DEFAULT_SIM_COMMAND: &str = "spike --log-commits --log=/dev/stdout";

/// Backend running the device as a simulator process.
#[derive(Debug)]
pub struct SimBackend {
    command: SimCommand,
    counters: Arc<RunCounters>,
}

impl SimBackend {
    pub fn new(command: SimCommand) -> Self {
        Self {
            command,
            counters: RunCounters::new(),
        }
    }

    pub fn counters(&self) -> &Arc<RunCounters> {
        &self.counters
    }
}

impl ClockControl for SimBackend {
    // Simulators run at whatever speed the host allows.
    fn set_clock_frequency(&mut self, clock: u32, requested_hz: u64) -> ClockGrant {
        debug!(clock, requested_hz, "simulated clock request");
        ClockGrant::granted(requested_hz)
    }
}

impl Backend for SimBackend {
    type Proc = SimProcControl;
    type Platform = SimPlatform;
    type Perf = HostPerfMonitor;

    fn proc_control(&mut self) -> Result<Self::Proc> {
        Ok(SimProcControl::new(
            self.command.clone(),
            SocketGuard::for_process(),
            Arc::clone(&self.counters),
        ))
    }

    fn platform(&mut self, ram: MemoryRegion, rom: MemoryRegion) -> Self::Platform {
        SimPlatform::new(ram, rom)
    }

    fn perf_monitor(&mut self) -> Self::Perf {
        HostPerfMonitor::new(Arc::clone(&self.counters))
    }

    fn external_mmio(&mut self) -> Box<dyn ExternalMmio> {
        Box::new(ConsoleMmio::stdout())
    }
}
