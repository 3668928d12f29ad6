//! Host-memory platform for simulated devices.
//!
//! The simulator child loads the workload ELF from its own argument vector,
//! so the image written here is a host-side mirror. It is readable through
//! [`Platform::read_memory`] but is not shared with the child.

use tracing::info;

use crate::memory::MemoryRegion;
use crate::platform::Platform;
use crate::{PlatformError, Result};

/// RAM and ROM windows backed by host memory, allocated by `init`.
#[derive(Debug)]
pub struct SimPlatform {
    ram_region: MemoryRegion,
    rom_region: MemoryRegion,
    ram: Vec<u8>,
    rom: Vec<u8>,
    initialized: bool,
}

impl SimPlatform {
    pub fn new(ram: MemoryRegion, rom: MemoryRegion) -> Self {
        Self {
            ram_region: ram,
            rom_region: rom,
            ram: Vec::new(),
            rom: Vec::new(),
            initialized: false,
        }
    }

    fn backing(&self, addr: u64, len: usize) -> Result<(bool, usize)> {
        if !self.initialized {
            return Err(PlatformError::NotInitialized);
        }
        let len64 = len as u64;
        if let Some(off) = self.ram_region.offset(addr, len64) {
            return Ok((true, off));
        }
        if let Some(off) = self.rom_region.offset(addr, len64) {
            return Ok((false, off));
        }
        Err(PlatformError::OutOfRange { addr, len: len64 })
    }
}

fn allocate(region: MemoryRegion) -> Result<Vec<u8>> {
    let size = usize::try_from(region.size).map_err(|_| PlatformError::RegionTooLarge(region.size))?;
    Ok(vec![0; size])
}

impl Platform for SimPlatform {
    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Err(PlatformError::AlreadyInitialized);
        }
        self.ram = allocate(self.ram_region)?;
        self.rom = allocate(self.rom_region)?;
        self.initialized = true;
        info!(ram = %self.ram_region, rom = %self.rom_region, "platform initialized");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ram(&self) -> MemoryRegion {
        self.ram_region
    }

    fn rom(&self) -> MemoryRegion {
        self.rom_region
    }

    fn write_memory(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let (is_ram, off) = self.backing(addr, data.len())?;
        let mem = if is_ram { &mut self.ram } else { &mut self.rom };
        mem[off..off + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_memory(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let (is_ram, off) = self.backing(addr, buf.len())?;
        let mem = if is_ram { &self.ram } else { &self.rom };
        buf.copy_from_slice(&mem[off..off + buf.len()]);
        Ok(())
    }
}
