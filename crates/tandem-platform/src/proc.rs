//! Host-target transport: packet configuration and execution events.

use std::sync::Arc;

use tandem_verify::PacketSink;

use crate::Result;
use crate::mmio::ExternalMmio;

/// How the device tags retired instructions for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPacketConfig {
    /// Packets dropped before delivery starts.
    pub packets_to_ignore: u64,
    /// Report the number of dropped packets on the first delivered packet.
    pub synchronization_packets: bool,
}

impl VerificationPacketConfig {
    /// Every packet is delivered.
    pub const ENABLED: Self = Self {
        packets_to_ignore: 0,
        synchronization_packets: true,
    };

    /// All-ones ignore mask: the device stops tagging packets.
    pub const DISABLED: Self = Self {
        packets_to_ignore: u64::MAX,
        synchronization_packets: false,
    };

    pub const fn is_disabled(&self) -> bool {
        self.packets_to_ignore == u64::MAX && !self.synchronization_packets
    }
}

impl Default for VerificationPacketConfig {
    fn default() -> Self {
        Self::ENABLED
    }
}

/// Everything the device needs to start executing the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub entry: u64,
    pub tohost: u64,
    pub fromhost: u64,
    /// Workload arguments, ELF path first.
    pub args: Vec<String>,
}

/// Event observed while the device runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcEvent {
    /// The device made progress; nothing for the host to do.
    Progress,
    /// The target wrote a nonzero value to `tohost`.
    ToHost(u64),
    /// The device stopped on its own with an exit code.
    Halted(i32),
}

/// Control channel to the processor under test.
pub trait ProcControl {
    fn configure_verification_packets(&mut self, config: VerificationPacketConfig);

    /// Install the receiver of verification packets.
    fn attach_packet_sink(&mut self, sink: Arc<dyn PacketSink>);

    /// Install the bridge serving the device's external MMIO requests.
    fn attach_mmio(&mut self, mmio: Box<dyn ExternalMmio>);

    fn start(&mut self, launch: &Launch) -> Result<()>;

    /// Block until the next event.
    fn poll(&mut self) -> Result<ProcEvent>;

    /// Acknowledge a `tohost` request.
    fn set_fromhost(&mut self, _value: u64) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}
