//! Verification packets: the per-instruction effects a device reports.

use std::fmt;

/// Architectural register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegWrite {
    /// Register index (never x0).
    pub reg: u8,
    pub value: u64,
}

/// Memory access performed by the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemAccess {
    pub addr: u64,
    /// Stored value. Loads are reported without one.
    pub value: Option<u64>,
    pub is_store: bool,
}

/// Effects observed for one retired instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationPacket {
    /// Packets dropped by the transport since the previous delivered packet.
    pub skipped: u64,
    /// Program counter.
    pub pc: u64,
    /// Raw instruction bits.
    pub instruction: u32,
    /// Destination register written (None if no write, or x0).
    pub dst: Option<RegWrite>,
    /// Memory access (if any).
    pub mem: Option<MemAccess>,
    /// True if the instruction trapped instead of retiring.
    pub trap: bool,
}

impl VerificationPacket {
    pub fn new(pc: u64, instruction: u32) -> Self {
        Self {
            pc,
            instruction,
            ..Default::default()
        }
    }

    /// Attach a register write. Writes to x0 are dropped.
    pub fn with_dst(mut self, reg: u8, value: u64) -> Self {
        self.dst = (reg != 0).then_some(RegWrite { reg, value });
        self
    }

    pub fn with_load(mut self, addr: u64) -> Self {
        self.mem = Some(MemAccess {
            addr,
            value: None,
            is_store: false,
        });
        self
    }

    pub fn with_store(mut self, addr: u64, value: u64) -> Self {
        self.mem = Some(MemAccess {
            addr,
            value: Some(value),
            is_store: true,
        });
        self
    }

    /// Value stored to `addr` by this instruction, if it is such a store.
    pub fn store_to(&self, addr: u64) -> Option<u64> {
        match self.mem {
            Some(MemAccess {
                addr: a,
                value: Some(v),
                is_store: true,
            }) if a == addr => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped > 0 {
            write!(f, "[skipped {}] ", self.skipped)?;
        }
        write!(f, "0x{:016x} (0x{:08x})", self.pc, self.instruction)?;
        if let Some(dst) = self.dst {
            write!(f, " x{} 0x{:016x}", dst.reg, dst.value)?;
        }
        if let Some(mem) = self.mem {
            write!(f, " mem 0x{:016x}", mem.addr)?;
            if let Some(value) = mem.value {
                write!(f, " 0x{value:016x}")?;
            }
        }
        if self.trap {
            write!(f, " trap")?;
        }
        Ok(())
    }
}
