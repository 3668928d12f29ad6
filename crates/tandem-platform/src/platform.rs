//! Platform bring-up and clock control.

use crate::Result;
use crate::memory::MemoryRegion;

/// Outcome of a clock frequency request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockGrant {
    /// Frequency actually in effect, in Hz.
    pub actual_hz: u64,
    /// Zero when the request was honoured.
    pub status: i32,
    /// Host error code accompanying a nonzero status.
    pub errno: i32,
}

impl ClockGrant {
    /// The request was honoured exactly.
    pub const fn granted(hz: u64) -> Self {
        Self {
            actual_hz: hz,
            status: 0,
            errno: 0,
        }
    }
}

/// Clock generator of the compute platform.
pub trait ClockControl {
    /// Best-effort request; the grant reports what is actually in effect.
    fn set_clock_frequency(&mut self, clock: u32, requested_hz: u64) -> ClockGrant;
}

/// Compute platform owning the RAM and ROM windows.
///
/// `init` brings the hardware up and must be called exactly once before any
/// memory access.
pub trait Platform {
    fn init(&mut self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    fn ram(&self) -> MemoryRegion;

    fn rom(&self) -> MemoryRegion;

    fn write_memory(&mut self, addr: u64, data: &[u8]) -> Result<()>;

    fn read_memory(&self, addr: u64, buf: &mut [u8]) -> Result<()>;

    /// Zero `len` bytes starting at `addr`.
    fn zero_memory(&mut self, addr: u64, len: u64) -> Result<()> {
        const CHUNK: u64 = 4096;
        let zeros = [0u8; CHUNK as usize];
        let mut done = 0;
        while done < len {
            let n = (len - done).min(CHUNK);
            self.write_memory(addr + done, &zeros[..n as usize])?;
            done += n;
        }
        Ok(())
    }
}
