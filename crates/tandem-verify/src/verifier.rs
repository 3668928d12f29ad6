//! Tandem verifier capability.

use std::io::{self, Write};

use crate::compare::MismatchKind;
use crate::packet::VerificationPacket;

/// Result of checking one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Packet accepted (or not checked at all).
    Accepted,
    /// Packet disagreed with the reference.
    Mismatch(MismatchKind),
}

impl Check {
    pub fn is_mismatch(self) -> bool {
        matches!(self, Self::Mismatch(_))
    }
}

/// A verifier fed with every verification packet of a run.
pub trait TandemVerifier {
    /// Inspect one packet.
    fn check(&mut self, packet: &VerificationPacket) -> Check;

    /// Write a status report. Must not change any accumulated state.
    fn write_status(&self, out: &mut dyn Write) -> io::Result<()>;
}
