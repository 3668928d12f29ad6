//! Packet comparison between the golden model and the device.

use crate::packet::VerificationPacket;

/// Kind of mismatch between expected and observed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MismatchKind {
    /// PC mismatch.
    Pc,
    /// Same PC but different instruction bits.
    Instruction,
    /// Different destination register.
    RegDest,
    /// Same register but different value.
    RegValue,
    /// Memory address mismatch.
    MemAddr,
    /// Stored value mismatch.
    MemValue,
    /// Reference wrote a register but the device didn't.
    MissingRegWrite,
    /// Device wrote a register but the reference didn't.
    ExtraRegWrite,
    /// Reference accessed memory but the device didn't.
    MissingMemAccess,
    /// Device accessed memory but the reference didn't.
    ExtraMemAccess,
    /// Device retired instructions after the reference finished.
    ActualTail,
}

impl std::fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pc => write!(f, "PC mismatch"),
            Self::Instruction => write!(f, "instruction mismatch"),
            Self::RegDest => write!(f, "register destination mismatch"),
            Self::RegValue => write!(f, "register value mismatch"),
            Self::MemAddr => write!(f, "memory address mismatch"),
            Self::MemValue => write!(f, "memory value mismatch"),
            Self::MissingRegWrite => write!(f, "missing register write"),
            Self::ExtraRegWrite => write!(f, "extra register write"),
            Self::MissingMemAccess => write!(f, "missing memory access"),
            Self::ExtraMemAccess => write!(f, "extra memory access"),
            Self::ActualTail => write!(f, "device ran past the reference"),
        }
    }
}

/// A recorded mismatch.
#[derive(Debug, Clone)]
pub struct Mismatch {
    /// Index of the checked packet.
    pub index: u64,
    /// Expected packet (from the reference), absent for tail mismatches.
    pub expected: Option<VerificationPacket>,
    /// Packet reported by the device.
    pub actual: VerificationPacket,
    pub kind: MismatchKind,
}

/// Comparison knobs.
#[derive(Debug, Clone)]
pub struct CompareConfig {
    /// Require exact register write matching.
    pub strict_reg_writes: bool,
    /// Require exact memory access matching.
    pub strict_mem_access: bool,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            strict_reg_writes: true,
            strict_mem_access: false, // devices rarely report load addresses
        }
    }
}

/// Compare two packets and return the kind of mismatch if any.
///
/// - PC must match exactly.
/// - Instruction bits are compared when both sides report them.
/// - Register writes are compared if either side has one (x0 never appears).
/// - Memory is compared for stores always, for loads only in strict mode.
pub fn compare_packets(
    expected: &VerificationPacket,
    actual: &VerificationPacket,
    config: &CompareConfig,
) -> Option<MismatchKind> {
    if expected.pc != actual.pc {
        return Some(MismatchKind::Pc);
    }

    if expected.instruction != 0 && actual.instruction != 0 && expected.instruction != actual.instruction {
        return Some(MismatchKind::Instruction);
    }

    if config.strict_reg_writes {
        match (expected.dst, actual.dst) {
            (Some(e), Some(a)) => {
                if e.reg != a.reg {
                    return Some(MismatchKind::RegDest);
                }
                if e.value != a.value {
                    return Some(MismatchKind::RegValue);
                }
            }
            (Some(_), None) => return Some(MismatchKind::MissingRegWrite),
            (None, Some(_)) => return Some(MismatchKind::ExtraRegWrite),
            (None, None) => {}
        }
    }

    let stores = expected.mem.is_some_and(|m| m.is_store) || actual.mem.is_some_and(|m| m.is_store);
    if config.strict_mem_access || stores {
        match (expected.mem, actual.mem) {
            (Some(e), Some(a)) => {
                if e.addr != a.addr {
                    return Some(MismatchKind::MemAddr);
                }
                if let (Some(ev), Some(av)) = (e.value, a.value)
                    && ev != av
                {
                    return Some(MismatchKind::MemValue);
                }
            }
            (Some(_), None) => return Some(MismatchKind::MissingMemAccess),
            (None, Some(_)) => return Some(MismatchKind::ExtraMemAccess),
            (None, None) => {}
        }
    }

    None
}
