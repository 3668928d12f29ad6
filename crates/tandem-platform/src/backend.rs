//! Factory for a complete set of collaborators.

use tandem_verify::{ReferenceModel, SpikeModel, SpikeOptions};

use crate::Result;
use crate::memory::MemoryRegion;
use crate::mmio::ExternalMmio;
use crate::perf::PerfMonitor;
use crate::platform::{ClockControl, Platform};
use crate::proc::ProcControl;

/// A target the harness can drive: hardware, FPGA, or a simulator.
pub trait Backend: ClockControl {
    type Proc: ProcControl;
    type Platform: Platform;
    type Perf: PerfMonitor;

    fn proc_control(&mut self) -> Result<Self::Proc>;

    /// Construct the platform. Bring-up is left to [`Platform::init`].
    fn platform(&mut self, ram: MemoryRegion, rom: MemoryRegion) -> Self::Platform;

    fn perf_monitor(&mut self) -> Self::Perf;

    fn external_mmio(&mut self) -> Box<dyn ExternalMmio>;

    /// Golden model mirroring the device for tandem verification.
    fn reference_model(
        &mut self,
        htif_args: &[String],
        ram_size: u64,
        isa: &str,
    ) -> tandem_verify::Result<Box<dyn ReferenceModel>> {
        let model = SpikeModel::start(&SpikeOptions::new(isa, ram_size), htif_args)?;
        Ok(Box::new(model))
    }
}
