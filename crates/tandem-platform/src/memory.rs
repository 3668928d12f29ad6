//! Address-mapped memory windows.

/// Base of the RAM window.
pub const RAM_BASE: u64 = 0x8000_0000;
/// Base of the ROM window.
pub const ROM_BASE: u64 = 0;
/// Default RAM size (64 MiB).
pub const DEFAULT_RAM_SIZE: u64 = 64 << 20;
/// Default ROM size (64 KiB).
pub const DEFAULT_ROM_SIZE: u64 = 64 << 10;

/// A contiguous window of the physical address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: u64,
    pub size: u64,
}

impl MemoryRegion {
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// RAM window of `size` bytes at [`RAM_BASE`].
    pub const fn ram(size: u64) -> Self {
        Self::new(RAM_BASE, size)
    }

    /// ROM window of `size` bytes at [`ROM_BASE`].
    pub const fn rom(size: u64) -> Self {
        Self::new(ROM_BASE, size)
    }

    /// One past the last address (saturating).
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    /// Whether `[addr, addr + len)` lies entirely inside the window.
    pub fn contains(&self, addr: u64, len: u64) -> bool {
        addr >= self.base && addr.checked_add(len).is_some_and(|end| end <= self.end())
    }

    /// Offset of `addr` into the window, if `[addr, addr + len)` fits.
    pub fn offset(&self, addr: u64, len: u64) -> Option<usize> {
        if !self.contains(addr, len) {
            return None;
        }
        usize::try_from(addr - self.base).ok()
    }
}

impl std::fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.base, self.end())
    }
}
